//! Read-through cache of survey content.
//!
//! Questions are cached per survey and options per question. Any mutation of
//! either set must be followed by [`ContentCache::invalidate`] for its scope
//! before the mutation is reported as successful.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use serde::{Serialize, de::DeserializeOwned};
use survey_common::{AppError, AppResult};
use survey_db::entities::{question, question_option};
use survey_db::repositories::{QuestionOptionRepository, QuestionRepository};
use tokio::sync::RwLock;
use tracing::warn;

/// A cached set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Questions keyed by survey ID.
    Questions,
    /// Options keyed by question ID.
    Options,
}

impl CacheScope {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Options => "options",
        }
    }
}

/// Cache backend storing serialized entries.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Get an entry.
    async fn get(&self, scope: CacheScope, id: &str) -> AppResult<Option<String>>;

    /// Store an entry.
    async fn put(&self, scope: CacheScope, id: &str, value: String) -> AppResult<()>;

    /// Drop every entry of a scope.
    async fn invalidate(&self, scope: CacheScope) -> AppResult<()>;
}

/// Shared content cache handle.
pub type ContentCacheService = Arc<dyn ContentCache>;

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpContentCache;

#[async_trait]
impl ContentCache for NoOpContentCache {
    async fn get(&self, _scope: CacheScope, _id: &str) -> AppResult<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _scope: CacheScope, _id: &str, _value: String) -> AppResult<()> {
        Ok(())
    }

    async fn invalidate(&self, _scope: CacheScope) -> AppResult<()> {
        Ok(())
    }
}

/// In-process cache with a fixed entry lifetime.
pub struct InMemoryContentCache {
    entries: RwLock<HashMap<(CacheScope, String), (String, Instant)>>,
    ttl: Duration,
}

impl InMemoryContentCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl ContentCache for InMemoryContentCache {
    async fn get(&self, scope: CacheScope, id: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(scope, id.to_string()))
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn put(&self, scope: CacheScope, id: &str, value: String) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert((scope, id.to_string()), (value, now + self.ttl));
        Ok(())
    }

    async fn invalidate(&self, scope: CacheScope) -> AppResult<()> {
        self.entries.write().await.retain(|(s, _), _| *s != scope);
        Ok(())
    }
}

/// Redis cache invalidated by generation counters.
///
/// Entry keys embed the scope's current generation. Invalidation increments
/// the generation, which leaves every older entry unreachable until its TTL
/// removes it.
#[derive(Clone)]
pub struct RedisContentCache {
    redis: Arc<RedisClient>,
    prefix: String,
    ttl_secs: i64,
}

impl RedisContentCache {
    /// Create a cache writing keys under `prefix`.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
            ttl_secs: ttl.as_secs() as i64,
        }
    }

    fn generation_key(&self, scope: CacheScope) -> String {
        format!("{}:gen:{}", self.prefix, scope.as_str())
    }

    async fn generation(&self, scope: CacheScope) -> AppResult<u64> {
        let generation: Option<u64> = self
            .redis
            .get::<Option<u64>, _>(self.generation_key(scope))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        Ok(generation.unwrap_or(0))
    }

    async fn entry_key(&self, scope: CacheScope, id: &str) -> AppResult<String> {
        let generation = self.generation(scope).await?;
        Ok(format!("{}:{}:{generation}:{id}", self.prefix, scope.as_str()))
    }
}

#[async_trait]
impl ContentCache for RedisContentCache {
    async fn get(&self, scope: CacheScope, id: &str) -> AppResult<Option<String>> {
        let key = self.entry_key(scope, id).await?;
        self.redis
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn put(&self, scope: CacheScope, id: &str, value: String) -> AppResult<()> {
        let key = self.entry_key(scope, id).await?;
        self.redis
            .set::<(), _, _>(key, value, Some(Expiration::EX(self.ttl_secs)), None, false)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn invalidate(&self, scope: CacheScope) -> AppResult<()> {
        self.redis
            .incr::<u64, _>(self.generation_key(scope))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        Ok(())
    }
}

/// Question and option reads through the content cache.
#[derive(Clone)]
pub struct ContentService {
    question_repo: QuestionRepository,
    option_repo: QuestionOptionRepository,
    cache: ContentCacheService,
}

impl ContentService {
    /// Create a new content service.
    #[must_use]
    pub fn new(
        question_repo: QuestionRepository,
        option_repo: QuestionOptionRepository,
        cache: ContentCacheService,
    ) -> Self {
        Self {
            question_repo,
            option_repo,
            cache,
        }
    }

    async fn cached<T: DeserializeOwned>(&self, scope: CacheScope, id: &str) -> Option<T> {
        match self.cache.get(scope, id).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(scope = scope.as_str(), id = %id, error = %e, "Discarding unreadable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(scope = scope.as_str(), id = %id, error = %e, "Content cache read failed");
                None
            }
        }
    }

    async fn store<T: Serialize + Sync>(&self, scope: CacheScope, id: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(scope = scope.as_str(), id = %id, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.put(scope, id, raw).await {
            warn!(scope = scope.as_str(), id = %id, error = %e, "Content cache write failed");
        }
    }

    /// Questions of a survey in serial order.
    pub async fn questions(&self, survey_id: &str) -> AppResult<Vec<question::Model>> {
        if let Some(questions) = self.cached(CacheScope::Questions, survey_id).await {
            return Ok(questions);
        }
        let questions = self.question_repo.find_by_survey(survey_id).await?;
        self.store(CacheScope::Questions, survey_id, &questions).await;
        Ok(questions)
    }

    /// Options of a question in serial order.
    pub async fn options(&self, question_id: &str) -> AppResult<Vec<question_option::Model>> {
        if let Some(options) = self.cached(CacheScope::Options, question_id).await {
            return Ok(options);
        }
        let options = self.option_repo.find_by_question(question_id).await?;
        self.store(CacheScope::Options, question_id, &options).await;
        Ok(options)
    }

    /// Options of every given question, keyed by question ID.
    pub async fn options_by_question(
        &self,
        questions: &[question::Model],
    ) -> AppResult<HashMap<String, Vec<question_option::Model>>> {
        let mut map = HashMap::with_capacity(questions.len());
        for q in questions {
            map.insert(q.id.clone(), self.options(&q.id).await?);
        }
        Ok(map)
    }

    /// Drop cached questions and options.
    pub async fn invalidate_all(&self) -> AppResult<()> {
        self.cache.invalidate(CacheScope::Options).await?;
        self.cache.invalidate(CacheScope::Questions).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use survey_db::entities::question::QuestionType;

    fn create_test_question(id: &str, serial_num: i32) -> question::Model {
        question::Model {
            id: id.to_string(),
            survey_id: "s1".to_string(),
            serial_num,
            subject: "Favourite dish".to_string(),
            description: String::new(),
            img: None,
            question_type: QuestionType::SingleChoice,
            required: true,
            unique: false,
            other_option: true,
            minimum_option: None,
            maximum_option: None,
            reg: None,
            created_at: Utc::now().into(),
        }
    }

    fn content_service(db: MockDatabase, cache: ContentCacheService) -> ContentService {
        let db = Arc::new(db.into_connection());
        ContentService::new(
            QuestionRepository::new(db.clone()),
            QuestionOptionRepository::new(db),
            cache,
        )
    }

    #[tokio::test]
    async fn test_in_memory_cache_invalidates_one_scope() {
        let cache = InMemoryContentCache::new(Duration::from_secs(60));

        cache.put(CacheScope::Questions, "s1", "q".to_string()).await.unwrap();
        cache.put(CacheScope::Options, "q1", "o".to_string()).await.unwrap();
        cache.invalidate(CacheScope::Questions).await.unwrap();

        assert_eq!(cache.get(CacheScope::Questions, "s1").await.unwrap(), None);
        assert_eq!(
            cache.get(CacheScope::Options, "q1").await.unwrap(),
            Some("o".to_string())
        );
    }

    #[tokio::test]
    async fn test_in_memory_cache_expires_entries() {
        let cache = InMemoryContentCache::new(Duration::ZERO);
        cache.put(CacheScope::Options, "q1", "o".to_string()).await.unwrap();
        assert_eq!(cache.get(CacheScope::Options, "q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_questions_read_through() {
        // One query result only: the second read must come from the cache
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_question("q1", 1),
            create_test_question("q2", 2),
        ]]);
        let service = content_service(
            db,
            Arc::new(InMemoryContentCache::new(Duration::from_secs(60))),
        );

        let first = service.questions("s1").await.unwrap();
        let second = service.questions("s1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second[1].id, "q2");
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_question("q1", 1)]])
            .append_query_results([[create_test_question("q9", 1)]]);
        let service = content_service(
            db,
            Arc::new(InMemoryContentCache::new(Duration::from_secs(60))),
        );

        assert_eq!(service.questions("s1").await.unwrap()[0].id, "q1");
        service.invalidate_all().await.unwrap();
        assert_eq!(service.questions("s1").await.unwrap()[0].id, "q9");
    }
}

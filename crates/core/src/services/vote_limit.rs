//! Vote limits: per-respondent submission caps per day and per survey.
//!
//! Counters live in external state behind [`VoteLimiter`]. Each increment and
//! bound check is a single atomic step, so concurrent submissions of one
//! respondent cannot overshoot a limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fred::clients::Client as RedisClient;
use fred::interfaces::LuaInterface;
use survey_common::{AppError, AppResult};
use survey_db::entities::survey;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lifetime of a daily counter. Outlives the day it counts.
const DAILY_COUNTER_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Minimum lifetime of a survey-wide counter.
const SUM_COUNTER_MIN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Atomic bounded counter store.
#[async_trait]
pub trait VoteLimiter: Send + Sync {
    /// Count one vote under `key`.
    ///
    /// The first vote creates the counter at 1 with the given lifetime. Fails
    /// with [`AppError::LimitExceeded`] and leaves the counter unchanged when
    /// the vote would take it past `limit`.
    async fn acquire(&self, key: &str, limit: u64, ttl: Duration) -> AppResult<u64>;

    /// Give back one vote taken by [`VoteLimiter::acquire`].
    async fn release(&self, key: &str) -> AppResult<()>;
}

/// Shared vote limiter handle.
pub type VoteLimiterService = Arc<dyn VoteLimiter>;

struct Counter {
    count: u64,
    expires_at: Instant,
}

/// In-process vote limiter for single-node deployments and tests.
#[derive(Default)]
pub struct InMemoryVoteLimiter {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryVoteLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteLimiter for InMemoryVoteLimiter {
    async fn acquire(&self, key: &str, limit: u64, ttl: Duration) -> AppResult<u64> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        counters.retain(|_, c| c.expires_at > now);

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + ttl,
        });
        if counter.count >= limit {
            return Err(AppError::LimitExceeded(
                "Submission limit reached".to_string(),
            ));
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get_mut(key) {
            counter.count = counter.count.saturating_sub(1);
        }
        Ok(())
    }
}

/// Bounded increment. Returns the new count, or -1 when the limit is reached.
/// A counter left without a lifetime gets one here.
const ACQUIRE_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count >= tonumber(ARGV[1]) then
  return -1
end
count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return count
";

/// Decrement that never creates a key or goes below zero.
const RELEASE_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
";

/// Redis-backed vote limiter shared by every node.
///
/// Each operation is one Lua script, so the bound check, the increment and
/// the expiry are applied together.
#[derive(Clone)]
pub struct RedisVoteLimiter {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisVoteLimiter {
    /// Create a limiter writing keys under `prefix`.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }
}

#[async_trait]
impl VoteLimiter for RedisVoteLimiter {
    async fn acquire(&self, key: &str, limit: u64, ttl: Duration) -> AppResult<u64> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ttl_secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);

        let count: i64 = self
            .redis
            .eval(ACQUIRE_SCRIPT, self.key(key), vec![limit, ttl_secs])
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        u64::try_from(count)
            .map_err(|_| AppError::LimitExceeded("Submission limit reached".to_string()))
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.redis
            .eval::<i64, _, _, _>(RELEASE_SCRIPT, self.key(key), Vec::<i64>::new())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        Ok(())
    }
}

/// Counters taken for one submission.
#[derive(Debug, Default)]
#[must_use]
pub struct VoteTicket {
    keys: Vec<String>,
}

impl VoteTicket {
    /// Keys of the counters this ticket holds.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Applies a survey's daily and lifetime limits to a respondent.
#[derive(Clone)]
pub struct VoteLimitService {
    limiter: VoteLimiterService,
    day_offset: ChronoDuration,
}

impl VoteLimitService {
    /// Create a vote limit service.
    ///
    /// `day_offset_hours` shifts the calendar-day boundary of daily limits
    /// from UTC midnight.
    #[must_use]
    pub fn new(limiter: VoteLimiterService, day_offset_hours: i32) -> Self {
        Self {
            limiter,
            day_offset: ChronoDuration::hours(i64::from(day_offset_hours)),
        }
    }

    fn daily_key(&self, survey_id: &str, respondent_id: &str, now: DateTime<Utc>) -> String {
        let day = (now + self.day_offset).date_naive();
        format!("vote:daily:{survey_id}:{respondent_id}:{day}")
    }

    fn sum_key(survey_id: &str, respondent_id: &str) -> String {
        format!("vote:sum:{survey_id}:{respondent_id}")
    }

    /// Take one vote from each configured limit. A limit of 0 is unlimited.
    pub async fn acquire(
        &self,
        survey: &survey::Model,
        respondent_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<VoteTicket> {
        let mut ticket = VoteTicket::default();

        if survey.daily_limit > 0 {
            let key = self.daily_key(&survey.id, respondent_id, now);
            self.limiter
                .acquire(&key, survey.daily_limit as u64, DAILY_COUNTER_TTL)
                .await
                .map_err(|e| match e {
                    AppError::LimitExceeded(_) => {
                        AppError::LimitExceeded("Daily submission limit reached".to_string())
                    }
                    other => other,
                })?;
            ticket.keys.push(key);
        }

        if survey.sum_limit > 0 {
            let key = Self::sum_key(&survey.id, respondent_id);
            let ttl = (survey.deadline.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or_default()
                + SUM_COUNTER_MIN_TTL;

            if let Err(e) = self
                .limiter
                .acquire(&key, survey.sum_limit as u64, ttl)
                .await
            {
                self.release(ticket).await;
                return Err(e);
            }
            ticket.keys.push(key);
        }

        debug!(
            survey_id = %survey.id,
            respondent = %respondent_id,
            counters = ticket.keys.len(),
            "Vote limits acquired"
        );
        Ok(ticket)
    }

    /// Give the ticket's votes back. Failures are logged only.
    pub async fn release(&self, ticket: VoteTicket) {
        for key in ticket.keys {
            if let Err(e) = self.limiter.release(&key).await {
                warn!(key = %key, error = %e, "Failed to release vote counter");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use survey_db::entities::survey::SurveyStatus;

    fn survey_with_limits(daily_limit: i32, sum_limit: i32) -> survey::Model {
        let now = Utc::now();
        survey::Model {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            title: "Limits".to_string(),
            description: String::new(),
            img: None,
            status: SurveyStatus::Published,
            survey_type: 0,
            daily_limit,
            sum_limit,
            verify: false,
            num: 0,
            start_time: now.into(),
            deadline: (now + ChronoDuration::days(30)).into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn service() -> VoteLimitService {
        VoteLimitService::new(Arc::new(InMemoryVoteLimiter::new()), 8)
    }

    #[tokio::test]
    async fn test_limiter_refuses_past_bound() {
        let limiter = InMemoryVoteLimiter::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(limiter.acquire("k", 2, ttl).await.unwrap(), 1);
        assert_eq!(limiter.acquire("k", 2, ttl).await.unwrap(), 2);
        assert!(matches!(
            limiter.acquire("k", 2, ttl).await,
            Err(AppError::LimitExceeded(_))
        ));

        limiter.release("k").await.unwrap();
        assert_eq!(limiter.acquire("k", 2, ttl).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_counter_starts_over() {
        let limiter = InMemoryVoteLimiter::new();

        limiter.acquire("k", 1, Duration::ZERO).await.unwrap();
        assert_eq!(limiter.acquire("k", 1, Duration::ZERO).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_daily_limit_rolls_over() {
        let service = service();
        let survey = survey_with_limits(2, 0);
        let today = Utc::now();

        service.acquire(&survey, "10.0.0.1", today).await.unwrap();
        service.acquire(&survey, "10.0.0.1", today).await.unwrap();
        assert!(matches!(
            service.acquire(&survey, "10.0.0.1", today).await,
            Err(AppError::LimitExceeded(_))
        ));

        // Other respondents are counted separately
        service.acquire(&survey, "10.0.0.2", today).await.unwrap();

        let tomorrow = today + ChronoDuration::days(1);
        service.acquire(&survey, "10.0.0.1", tomorrow).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_sum_limit_releases_daily_counter() {
        let service = service();
        let survey = survey_with_limits(5, 1);
        let now = Utc::now();

        service.acquire(&survey, "r", now).await.unwrap();
        assert!(service.acquire(&survey, "r", now).await.is_err());

        // Daily counter still has room for four more: the failed attempt gave its vote back
        let daily_only = survey_with_limits(5, 0);
        for _ in 0..4 {
            service.acquire(&daily_only, "r", now).await.unwrap();
        }
        assert!(service.acquire(&daily_only, "r", now).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_limits_take_no_counters() {
        let service = service();
        let ticket = service
            .acquire(&survey_with_limits(0, 0), "r", Utc::now())
            .await
            .unwrap();
        assert!(ticket.keys().is_empty());
    }

    #[tokio::test]
    async fn test_day_boundary_follows_offset() {
        let service = VoteLimitService::new(Arc::new(InMemoryVoteLimiter::new()), 8);
        let survey = survey_with_limits(1, 0);

        // 15:30 and 16:30 UTC fall on different days at UTC+8
        let before = DateTime::parse_from_rfc3339("2026-03-01T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let after = DateTime::parse_from_rfc3339("2026-03-01T16:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        service.acquire(&survey, "r", before).await.unwrap();
        service.acquire(&survey, "r", after).await.unwrap();
    }
}

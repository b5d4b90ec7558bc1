//! Survey queries and status changes.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use survey_common::{AppError, AppResult};
use survey_db::entities::{
    question, question_option,
    survey::{self, EffectiveStatus, SurveyStatus},
    user,
};
use survey_db::repositories::SurveyRepository;

use super::cache::ContentService;

/// Default page size for survey listings.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest page size accepted by listings.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Clamp listing paging parameters.
#[must_use]
pub fn paging(page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    (
        page.unwrap_or(1).max(1),
        page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    )
}

/// A question with its options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: question::Model,
    pub options: Vec<question_option::Model>,
}

/// A survey with its full content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: survey::Model,
    pub effective_status: EffectiveStatus,
    pub questions: Vec<QuestionDetail>,
}

/// One line of a survey listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub id: String,
    pub title: String,
    pub effective_status: EffectiveStatus,
    pub num: i32,
    pub start_time: String,
    pub deadline: String,
    pub created_at: String,
}

impl SurveySummary {
    fn new(s: survey::Model, now: DateTime<Utc>) -> Self {
        Self {
            effective_status: s.effective_status(now),
            id: s.id,
            title: s.title,
            num: s.num,
            start_time: s.start_time.to_rfc3339(),
            deadline: s.deadline.to_rfc3339(),
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

/// Input for listing surveys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSurveysInput {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
}

/// One page of surveys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyPage {
    pub items: Vec<SurveySummary>,
    pub total: u64,
}

/// Listing rank: published first, then draft and paused, expired last.
const fn status_rank(status: EffectiveStatus) -> u8 {
    match status {
        EffectiveStatus::Published => 0,
        EffectiveStatus::Draft | EffectiveStatus::Paused => 1,
        EffectiveStatus::Expired => 2,
    }
}

/// Service for reading surveys.
#[derive(Clone)]
pub struct SurveyService {
    survey_repo: SurveyRepository,
    content: ContentService,
}

impl SurveyService {
    /// Create a new survey service.
    #[must_use]
    pub const fn new(survey_repo: SurveyRepository, content: ContentService) -> Self {
        Self {
            survey_repo,
            content,
        }
    }

    /// Get a survey with its questions and options.
    pub async fn get(&self, survey_id: &str, now: DateTime<Utc>) -> AppResult<SurveyDetail> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        self.detail(survey, now).await
    }

    /// Get a survey as shown to respondents.
    ///
    /// Only published surveys that have not expired are visible.
    pub async fn get_published(&self, survey_id: &str, now: DateTime<Utc>) -> AppResult<SurveyDetail> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if survey.effective_status(now) != EffectiveStatus::Published {
            return Err(AppError::BadRequest("Survey is not open".to_string()));
        }
        self.detail(survey, now).await
    }

    async fn detail(&self, survey: survey::Model, now: DateTime<Utc>) -> AppResult<SurveyDetail> {
        let questions = self.content.questions(&survey.id).await?;
        let mut details = Vec::with_capacity(questions.len());
        for q in questions {
            let options = self.content.options(&q.id).await?;
            details.push(QuestionDetail {
                question: q,
                options,
            });
        }

        Ok(SurveyDetail {
            effective_status: survey.effective_status(now),
            survey,
            questions: details,
        })
    }

    /// List the surveys an administrator can see.
    ///
    /// Super admins see every survey; other users see surveys they own or
    /// manage.
    pub async fn list(
        &self,
        user: &user::Model,
        input: ListSurveysInput,
        now: DateTime<Utc>,
    ) -> AppResult<SurveyPage> {
        let (page, page_size) = paging(input.page, input.page_size);
        let scope = (!user.is_super_admin).then_some(user.id.as_str());

        let mut surveys = self.survey_repo.find_accessible(scope).await?;

        if let Some(title) = input.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = title.to_lowercase();
            surveys.retain(|s| s.title.to_lowercase().contains(&needle));
        }

        // Stable: newest first within a rank, as loaded
        surveys.sort_by_key(|s| status_rank(s.effective_status(now)));

        let total = surveys.len() as u64;
        let items = surveys
            .into_iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .map(|s| SurveySummary::new(s, now))
            .collect();

        Ok(SurveyPage { items, total })
    }

    /// Set the stored status of a survey.
    pub async fn update_status(
        &self,
        survey_id: &str,
        status: SurveyStatus,
        now: DateTime<Utc>,
    ) -> AppResult<survey::Model> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if survey.status == status {
            return Ok(survey);
        }

        let mut model: survey::ActiveModel = survey.into();
        model.status = Set(status);
        model.updated_at = Set(now.into());

        let updated = self.survey_repo.update(model).await?;
        tracing::info!(survey_id = %survey_id, status = ?status, "Survey status changed");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::cache::NoOpContentCache;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;
    use survey_db::repositories::{QuestionOptionRepository, QuestionRepository};

    fn create_test_survey(id: &str, title: &str, status: SurveyStatus, age_hours: i64, expired: bool) -> survey::Model {
        let now = Utc::now();
        let deadline = if expired {
            now - Duration::hours(1)
        } else {
            now + Duration::days(7)
        };
        survey::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: title.to_string(),
            description: String::new(),
            img: None,
            status,
            survey_type: 0,
            daily_limit: 0,
            sum_limit: 0,
            verify: false,
            num: 0,
            start_time: (now - Duration::days(30)).into(),
            deadline: deadline.into(),
            created_at: (now - Duration::hours(age_hours)).into(),
            updated_at: now.into(),
        }
    }

    fn super_admin() -> user::Model {
        user::Model {
            id: "root".to_string(),
            username: "root".to_string(),
            name: None,
            token: None,
            is_super_admin: true,
            created_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase) -> SurveyService {
        let db = Arc::new(db.into_connection());
        let content = ContentService::new(
            QuestionRepository::new(db.clone()),
            QuestionOptionRepository::new(db.clone()),
            Arc::new(NoOpContentCache),
        );
        SurveyService::new(SurveyRepository::new(db), content)
    }

    #[test]
    fn test_paging_defaults() {
        assert_eq!(paging(None, None), (1, 10));
        assert_eq!(paging(Some(0), Some(1000)), (1, 100));
    }

    #[tokio::test]
    async fn test_list_orders_by_status_group() {
        // Repository order is newest first
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_survey("s4", "Expired poll", SurveyStatus::Published, 1, true),
            create_test_survey("s3", "Draft poll", SurveyStatus::Draft, 2, false),
            create_test_survey("s2", "Live poll", SurveyStatus::Published, 3, false),
            create_test_survey("s1", "Paused poll", SurveyStatus::Paused, 4, false),
            create_test_survey("s0", "Old live poll", SurveyStatus::Published, 5, false),
        ]]);

        let page = service(db)
            .list(&super_admin(), ListSurveysInput::default(), Utc::now())
            .await
            .unwrap();

        let ids: Vec<&str> = page.items.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s0", "s3", "s1", "s4"]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn test_list_filters_title_case_insensitively() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_survey("s2", "Canteen Feedback", SurveyStatus::Published, 1, false),
            create_test_survey("s1", "Library hours", SurveyStatus::Published, 2, false),
        ]]);

        let page = service(db)
            .list(
                &super_admin(),
                ListSurveysInput {
                    title: Some("canteen".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "s2");
    }

    #[tokio::test]
    async fn test_list_page_out_of_range() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_survey("s1", "Only", SurveyStatus::Draft, 1, false),
        ]]);

        let page = service(db)
            .list(
                &super_admin(),
                ListSurveysInput {
                    page: Some(3),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_get_published_rejects_draft() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_survey("s1", "Draft", SurveyStatus::Draft, 1, false),
        ]]);

        let result = service(db).get_published("s1", Utc::now()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}

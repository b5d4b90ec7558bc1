//! Question and option repositories.

use std::sync::Arc;

use crate::entities::{Question, QuestionOption, question, question_option};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use survey_common::{AppError, AppResult};

/// Question repository for database operations.
#[derive(Clone)]
pub struct QuestionRepository {
    db: Arc<DatabaseConnection>,
}

impl QuestionRepository {
    /// Create a new question repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a question by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<question::Model>> {
        Question::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Questions of a survey in serial order.
    pub async fn find_by_survey(&self, survey_id: &str) -> AppResult<Vec<question::Model>> {
        Question::find()
            .filter(question::Column::SurveyId.eq(survey_id))
            .order_by_asc(question::Column::SerialNum)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Question option repository for database operations.
#[derive(Clone)]
pub struct QuestionOptionRepository {
    db: Arc<DatabaseConnection>,
}

impl QuestionOptionRepository {
    /// Create a new option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Options of a question in serial order.
    pub async fn find_by_question(
        &self,
        question_id: &str,
    ) -> AppResult<Vec<question_option::Model>> {
        QuestionOption::find()
            .filter(question_option::Column::QuestionId.eq(question_id))
            .order_by_asc(question_option::Column::SerialNum)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every option of a survey, grouped by question then serial order.
    pub async fn find_by_survey(&self, survey_id: &str) -> AppResult<Vec<question_option::Model>> {
        QuestionOption::find()
            .filter(question_option::Column::SurveyId.eq(survey_id))
            .order_by_asc(question_option::Column::QuestionId)
            .order_by_asc(question_option::Column::SerialNum)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

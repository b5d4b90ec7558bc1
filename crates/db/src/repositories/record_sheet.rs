//! Verification record repository.

use std::sync::Arc;

use crate::entities::{RecordSheet, record_sheet};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use survey_common::{AppError, AppResult};

/// Verification record repository for database operations.
#[derive(Clone)]
pub struct RecordSheetRepository {
    db: Arc<DatabaseConnection>,
}

impl RecordSheetRepository {
    /// Create a new record repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the record of a respondent for a survey.
    pub async fn find_by_respondent(
        &self,
        survey_id: &str,
        respondent_id: &str,
    ) -> AppResult<Option<record_sheet::Model>> {
        RecordSheet::find()
            .filter(record_sheet::Column::SurveyId.eq(survey_id))
            .filter(record_sheet::Column::RespondentId.eq(respondent_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a record.
    pub async fn create(&self, model: record_sheet::ActiveModel) -> AppResult<record_sheet::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a record.
    pub async fn update(&self, model: record_sheet::ActiveModel) -> AppResult<record_sheet::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

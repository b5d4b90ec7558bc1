//! Question preset repository.

use std::sync::Arc;

use crate::entities::{QuestionPreset, question_preset};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::OnConflict,
};
use survey_common::{AppError, AppResult};

/// Question preset repository for database operations.
#[derive(Clone)]
pub struct QuestionPresetRepository {
    db: Arc<DatabaseConnection>,
}

impl QuestionPresetRepository {
    /// Create a new question preset repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a preset by name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<question_preset::Model>> {
        QuestionPreset::find()
            .filter(question_preset::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a preset by name, returning error if not found.
    pub async fn get_by_name(&self, name: &str) -> AppResult<question_preset::Model> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question preset: {name}")))
    }

    /// Insert a preset, or replace the value of the preset with the same name.
    pub async fn upsert(
        &self,
        model: question_preset::ActiveModel,
    ) -> AppResult<question_preset::Model> {
        let name = match &model.name {
            ActiveValue::Set(name) | ActiveValue::Unchanged(name) => name.clone(),
            ActiveValue::NotSet => {
                return Err(AppError::Internal("Preset name not set".to_string()));
            }
        };

        QuestionPreset::insert(model)
            .on_conflict(
                OnConflict::column(question_preset::Column::Name)
                    .update_columns([
                        question_preset::Column::Value,
                        question_preset::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.get_by_name(&name).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_preset(name: &str, value: &str) -> question_preset::Model {
        question_preset::Model {
            id: "p1".to_string(),
            name: name.to_string(),
            value: value.to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_preset("colleges", "Arts,Science")]])
                .into_connection(),
        );

        let repo = QuestionPresetRepository::new(db);
        let preset = repo.get_by_name("colleges").await.unwrap();

        assert_eq!(preset.values(), vec!["Arts", "Science"]);
    }

    #[tokio::test]
    async fn test_get_by_name_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<question_preset::Model>::new()])
                .into_connection(),
        );

        let repo = QuestionPresetRepository::new(db);
        assert!(matches!(
            repo.get_by_name("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_value_has_no_values() {
        assert!(create_test_preset("empty", "").values().is_empty());
    }
}

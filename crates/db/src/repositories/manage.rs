//! Manage grant repository.

use std::sync::Arc;

use crate::entities::{Manage, manage};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use survey_common::{AppError, AppResult};

/// Manage grant repository for database operations.
#[derive(Clone)]
pub struct ManageRepository {
    db: Arc<DatabaseConnection>,
}

impl ManageRepository {
    /// Create a new manage repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Check whether a user holds a grant on a survey.
    pub async fn exists(&self, user_id: &str, survey_id: &str) -> AppResult<bool> {
        let count = Manage::find()
            .filter(manage::Column::UserId.eq(user_id))
            .filter(manage::Column::SurveyId.eq(survey_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Grants held by a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<manage::Model>> {
        Manage::find()
            .filter(manage::Column::UserId.eq(user_id))
            .order_by_desc(manage::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a grant. A second grant for the same pair is a conflict.
    pub async fn create(&self, model: manage::ActiveModel) -> AppResult<manage::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if super::is_unique_violation(&e) {
                AppError::Conflict("Permission already granted".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Remove a grant.
    pub async fn delete(&self, user_id: &str, survey_id: &str) -> AppResult<()> {
        let result = Manage::delete_many()
            .filter(manage::Column::UserId.eq(user_id))
            .filter(manage::Column::SurveyId.eq(survey_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Permission grant".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_delete_missing_grant() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ManageRepository::new(db);
        let result = repo.delete("u1", "s1").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

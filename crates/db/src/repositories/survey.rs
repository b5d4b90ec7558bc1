//! Survey repository.
//!
//! Besides the survey row itself this owns the transactional writes of a
//! survey's question/option content and the cascading delete.

use std::sync::Arc;

use crate::entities::{
    Manage, Question, QuestionOption, RecordSheet, Survey, manage, question, question_option,
    record_sheet, survey,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use survey_common::{AppError, AppResult};

/// A question with its options, ready to be inserted.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    /// The question row.
    pub question: question::ActiveModel,
    /// Its options in serial order.
    pub options: Vec<question_option::ActiveModel>,
}

/// Survey repository for database operations.
#[derive(Clone)]
pub struct SurveyRepository {
    db: Arc<DatabaseConnection>,
}

async fn insert_content<C: ConnectionTrait>(conn: &C, drafts: Vec<QuestionDraft>) -> Result<(), DbErr> {
    for draft in drafts {
        draft.question.insert(conn).await?;
        if !draft.options.is_empty() {
            QuestionOption::insert_many(draft.options)
                .exec_without_returning(conn)
                .await?;
        }
    }
    Ok(())
}

async fn delete_content<C: ConnectionTrait>(conn: &C, survey_id: &str) -> Result<(), DbErr> {
    QuestionOption::delete_many()
        .filter(question_option::Column::SurveyId.eq(survey_id))
        .exec(conn)
        .await?;
    Question::delete_many()
        .filter(question::Column::SurveyId.eq(survey_id))
        .exec(conn)
        .await?;
    Ok(())
}

impl SurveyRepository {
    /// Create a new survey repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a survey by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<survey::Model>> {
        Survey::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a survey by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<survey::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Survey: {id}")))
    }

    /// Surveys visible to an administrator, newest first.
    ///
    /// `None` returns every survey. Otherwise owned and managed surveys.
    pub async fn find_accessible(&self, user_id: Option<&str>) -> AppResult<Vec<survey::Model>> {
        let mut query = Survey::find();

        if let Some(user_id) = user_id {
            let managed: Vec<String> = Manage::find()
                .select_only()
                .column(manage::Column::SurveyId)
                .filter(manage::Column::UserId.eq(user_id))
                .into_tuple()
                .all(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            query = query.filter(
                Condition::any()
                    .add(survey::Column::UserId.eq(user_id))
                    .add(survey::Column::Id.is_in(managed)),
            );
        }

        query
            .order_by_desc(survey::Column::CreatedAt)
            .order_by_desc(survey::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a survey with its questions and options in one transaction.
    pub async fn create_with_content(
        &self,
        model: survey::ActiveModel,
        drafts: Vec<QuestionDraft>,
    ) -> AppResult<survey::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        insert_content(&txn, drafts)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(created)
    }

    /// Update the survey row and replace all of its questions and options.
    ///
    /// Old question and option IDs are gone afterwards.
    pub async fn replace_content(
        &self,
        model: survey::ActiveModel,
        drafts: Vec<QuestionDraft>,
    ) -> AppResult<survey::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = model
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        delete_content(&txn, &updated.id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        insert_content(&txn, drafts)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(updated)
    }

    /// Update a survey row.
    pub async fn update(&self, model: survey::ActiveModel) -> AppResult<survey::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Increment the stored sheet counter atomically.
    pub async fn increment_num(&self, id: &str) -> AppResult<()> {
        Survey::update_many()
            .col_expr(survey::Column::Num, Expr::col(survey::Column::Num).add(1))
            .filter(survey::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a survey and every row belonging to it in one transaction.
    ///
    /// Sheets, answers, verification records, questions, options and manage
    /// grants go with it. Files are the caller's concern.
    pub async fn delete_cascade(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::answer_sheet::delete_sheets_for_survey(&txn, id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        RecordSheet::delete_many()
            .filter(record_sheet::Column::SurveyId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        delete_content(&txn, id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Manage::delete_many()
            .filter(manage::Column::SurveyId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let result = Survey::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Survey: {id}")));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::survey::SurveyStatus;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_survey(id: &str, user_id: &str) -> survey::Model {
        let now = Utc::now();
        survey::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: "Canteen feedback".to_string(),
            description: String::new(),
            img: None,
            status: SurveyStatus::Published,
            survey_type: 0,
            daily_limit: 0,
            sum_limit: 0,
            verify: false,
            num: 0,
            start_time: now.into(),
            deadline: (now + Duration::days(7)).into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<survey::Model>::new()])
                .into_connection(),
        );

        let repo = SurveyRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_accessible_for_super_admin() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_survey("s2", "u2"),
                    create_test_survey("s1", "u1"),
                ]])
                .into_connection(),
        );

        let repo = SurveyRepository::new(db);
        let result = repo.find_accessible(None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "s2");
    }

    #[tokio::test]
    async fn test_increment_num() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = SurveyRepository::new(db);
        assert!(repo.increment_num("s1").await.is_ok());
    }
}

//! Answer sheet store.
//!
//! A sheet, its answers and the uniqueness claims of its unique answers are
//! written in one transaction. The claim table's unique index decides which of
//! two racing submissions wins. The same transaction re-reads the answered
//! questions, so a sheet never lands on questions a content replacement has
//! removed.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::entities::{
    Answer, AnswerSheet, Question, UniqueAnswer, answer, answer_sheet, question,
    question::QuestionType, unique_answer,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use sha2::{Digest, Sha256};
use survey_common::{AppError, AppResult};

/// A submission ready to be stored.
#[derive(Debug, Clone)]
pub struct SheetDraft {
    /// Sheet ID.
    pub id: String,
    /// Survey answered.
    pub survey_id: String,
    /// Verified identity or client address.
    pub respondent_id: String,
    /// Submission time.
    pub submitted_at: DateTimeWithTimeZone,
    /// Answers in submission order.
    pub answers: Vec<AnswerDraft>,
}

/// One answer of a [`SheetDraft`].
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    /// Answer ID.
    pub id: String,
    /// Question answered.
    pub question_id: String,
    /// Question type at submission time.
    pub question_type: QuestionType,
    /// Answer content.
    pub content: String,
}

/// One page of sheets.
#[derive(Debug, Clone)]
pub struct SheetPage {
    /// Sheets on this page, oldest first.
    pub sheets: Vec<answer_sheet::Model>,
    /// Sheets matching the query across all pages.
    pub total: u64,
}

/// Hex SHA-256 of answer content.
#[must_use]
pub fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Fail with [`AppError::NotFound`] unless every referenced question is
/// still part of the survey.
///
/// On `PostgreSQL` the rows are read `FOR SHARE`, so a concurrent content
/// replacement waits for this transaction or is seen as already done.
async fn ensure_current_questions<C: ConnectionTrait>(
    conn: &C,
    survey_id: &str,
    question_ids: &BTreeSet<String>,
) -> AppResult<()> {
    if question_ids.is_empty() {
        return Ok(());
    }

    let mut query = Question::find()
        .select_only()
        .column(question::Column::Id)
        .filter(question::Column::SurveyId.eq(survey_id))
        .filter(question::Column::Id.is_in(question_ids.iter().cloned()));
    if conn.get_database_backend() == DatabaseBackend::Postgres {
        query = query.lock_shared();
    }

    let current: HashSet<String> = query
        .into_tuple::<String>()
        .all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_iter()
        .collect();

    match question_ids.iter().find(|id| !current.contains(*id)) {
        Some(stale) => Err(AppError::NotFound(format!("Question: {stale}"))),
        None => Ok(()),
    }
}

pub(crate) async fn delete_sheets_for_survey<C: ConnectionTrait>(
    conn: &C,
    survey_id: &str,
) -> Result<(), DbErr> {
    Answer::delete_many()
        .filter(answer::Column::SurveyId.eq(survey_id))
        .exec(conn)
        .await?;
    UniqueAnswer::delete_many()
        .filter(unique_answer::Column::SurveyId.eq(survey_id))
        .exec(conn)
        .await?;
    AnswerSheet::delete_many()
        .filter(answer_sheet::Column::SurveyId.eq(survey_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Answer sheet repository for database operations.
#[derive(Clone)]
pub struct AnswerSheetRepository {
    db: Arc<DatabaseConnection>,
}

impl AnswerSheetRepository {
    /// Create a new answer sheet repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a sheet.
    ///
    /// Answers to questions in `unique_question_ids` claim their content for
    /// the survey. A claim already held by another sheet fails the whole save
    /// with [`AppError::DuplicateAnswer`] and nothing is written. An answer to
    /// a question that is no longer part of the survey fails it with
    /// [`AppError::NotFound`].
    pub async fn save(
        &self,
        draft: SheetDraft,
        unique_question_ids: &HashSet<String>,
    ) -> AppResult<answer_sheet::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let question_ids: BTreeSet<String> = draft
            .answers
            .iter()
            .map(|a| a.question_id.clone())
            .collect();
        ensure_current_questions(&txn, &draft.survey_id, &question_ids).await?;

        // Earlier sheets of this respondent stop being the latest
        AnswerSheet::update_many()
            .col_expr(answer_sheet::Column::Unique, Expr::value(false))
            .filter(answer_sheet::Column::SurveyId.eq(draft.survey_id.as_str()))
            .filter(answer_sheet::Column::RespondentId.eq(draft.respondent_id.as_str()))
            .filter(answer_sheet::Column::Unique.eq(true))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let sheet = answer_sheet::ActiveModel {
            id: Set(draft.id.clone()),
            survey_id: Set(draft.survey_id.clone()),
            respondent_id: Set(draft.respondent_id),
            submitted_at: Set(draft.submitted_at),
            unique: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut claims = Vec::new();
        let mut answers = Vec::with_capacity(draft.answers.len());
        for (position, item) in draft.answers.into_iter().enumerate() {
            if unique_question_ids.contains(&item.question_id) {
                claims.push((
                    item.question_id.clone(),
                    unique_answer::ActiveModel {
                        id: Set(item.id.clone()),
                        survey_id: Set(draft.survey_id.clone()),
                        question_id: Set(item.question_id.clone()),
                        content_digest: Set(content_digest(&item.content)),
                        answer_sheet_id: Set(draft.id.clone()),
                    },
                ));
            }
            answers.push(answer::ActiveModel {
                id: Set(item.id),
                answer_sheet_id: Set(draft.id.clone()),
                survey_id: Set(draft.survey_id.clone()),
                question_id: Set(item.question_id),
                question_type: Set(item.question_type),
                position: Set(position as i32),
                content: Set(item.content),
            });
        }

        if !answers.is_empty() {
            Answer::insert_many(answers)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        for (question_id, claim) in claims {
            UniqueAnswer::insert(claim)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| {
                    if super::is_unique_violation(&e) {
                        AppError::DuplicateAnswer(format!(
                            "Answer to question {question_id} was already submitted"
                        ))
                    } else {
                        AppError::Database(e.to_string())
                    }
                })?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(sheet)
    }

    /// Find a sheet by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<answer_sheet::Model>> {
        AnswerSheet::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a sheet by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<answer_sheet::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer sheet: {id}")))
    }

    /// Page through a survey's sheets, oldest first. `page` starts at 1.
    ///
    /// A non-empty `search_text` keeps sheets with an answer containing it
    /// (case-sensitive). `only_unique` keeps each respondent's latest sheet.
    pub async fn query_by_survey(
        &self,
        survey_id: &str,
        page: u64,
        page_size: u64,
        search_text: &str,
        only_unique: bool,
    ) -> AppResult<SheetPage> {
        let mut query = AnswerSheet::find().filter(answer_sheet::Column::SurveyId.eq(survey_id));

        if only_unique {
            query = query.filter(answer_sheet::Column::Unique.eq(true));
        }

        if !search_text.is_empty() {
            // LIKE may be case-insensitive on some backends, so recheck here
            let candidates: Vec<(String, String)> = Answer::find()
                .select_only()
                .column(answer::Column::AnswerSheetId)
                .column(answer::Column::Content)
                .filter(answer::Column::SurveyId.eq(survey_id))
                .filter(answer::Column::Content.contains(search_text))
                .into_tuple()
                .all(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            let sheet_ids: BTreeSet<String> = candidates
                .into_iter()
                .filter(|(_, content)| content.contains(search_text))
                .map(|(sheet_id, _)| sheet_id)
                .collect();

            if sheet_ids.is_empty() {
                return Ok(SheetPage {
                    sheets: Vec::new(),
                    total: 0,
                });
            }
            query = query.filter(answer_sheet::Column::Id.is_in(sheet_ids));
        }

        let paginator = query
            .order_by_asc(answer_sheet::Column::SubmittedAt)
            .order_by_asc(answer_sheet::Column::Id)
            .paginate(self.db.as_ref(), page_size.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let sheets = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(SheetPage { sheets, total })
    }

    /// Every sheet of a survey, oldest first.
    pub async fn find_all_by_survey(
        &self,
        survey_id: &str,
        only_unique: bool,
    ) -> AppResult<Vec<answer_sheet::Model>> {
        let mut query = AnswerSheet::find().filter(answer_sheet::Column::SurveyId.eq(survey_id));
        if only_unique {
            query = query.filter(answer_sheet::Column::Unique.eq(true));
        }
        query
            .order_by_asc(answer_sheet::Column::SubmittedAt)
            .order_by_asc(answer_sheet::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count a survey's sheets.
    pub async fn count_by_survey(&self, survey_id: &str, only_unique: bool) -> AppResult<u64> {
        let mut query = AnswerSheet::find().filter(answer_sheet::Column::SurveyId.eq(survey_id));
        if only_unique {
            query = query.filter(answer_sheet::Column::Unique.eq(true));
        }
        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Sheets of one respondent for a survey, oldest first.
    pub async fn find_by_respondent(
        &self,
        survey_id: &str,
        respondent_id: &str,
        only_unique: bool,
    ) -> AppResult<Vec<answer_sheet::Model>> {
        let mut query = AnswerSheet::find()
            .filter(answer_sheet::Column::SurveyId.eq(survey_id))
            .filter(answer_sheet::Column::RespondentId.eq(respondent_id));
        if only_unique {
            query = query.filter(answer_sheet::Column::Unique.eq(true));
        }
        query
            .order_by_asc(answer_sheet::Column::SubmittedAt)
            .order_by_asc(answer_sheet::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Answers of the given sheets in submission order.
    pub async fn find_answers_for_sheets(
        &self,
        sheet_ids: &[String],
    ) -> AppResult<Vec<answer::Model>> {
        if sheet_ids.is_empty() {
            return Ok(vec![]);
        }

        Answer::find()
            .filter(answer::Column::AnswerSheetId.is_in(sheet_ids.to_vec()))
            .order_by_asc(answer::Column::AnswerSheetId)
            .order_by_asc(answer::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Answers of a survey whose content references an uploaded file.
    pub async fn find_upload_answers_by_survey(
        &self,
        survey_id: &str,
    ) -> AppResult<Vec<answer::Model>> {
        Answer::find()
            .filter(answer::Column::SurveyId.eq(survey_id))
            .filter(
                answer::Column::QuestionType
                    .is_in([QuestionType::ImageUpload, QuestionType::FileUpload]),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every sheet of a survey with its answers and claims.
    pub async fn delete_by_survey(&self, survey_id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        delete_sheets_for_survey(&txn, survey_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete one sheet with its answers and claims.
    ///
    /// Deleting a respondent's latest sheet makes their newest remaining
    /// sheet for the survey the latest one.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let sheet = AnswerSheet::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Answer sheet: {id}")))?;

        Answer::delete_many()
            .filter(answer::Column::AnswerSheetId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        UniqueAnswer::delete_many()
            .filter(unique_answer::Column::AnswerSheetId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let result = AnswerSheet::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Answer sheet: {id}")));
        }

        if sheet.unique {
            let newest = AnswerSheet::find()
                .filter(answer_sheet::Column::SurveyId.eq(sheet.survey_id.as_str()))
                .filter(answer_sheet::Column::RespondentId.eq(sheet.respondent_id.as_str()))
                .order_by_desc(answer_sheet::Column::SubmittedAt)
                .order_by_desc(answer_sheet::Column::Id)
                .one(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if let Some(newest) = newest {
                AnswerSheet::update_many()
                    .col_expr(answer_sheet::Column::Unique, Expr::value(true))
                    .filter(answer_sheet::Column::Id.eq(newest.id))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

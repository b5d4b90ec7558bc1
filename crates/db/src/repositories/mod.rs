//! Repositories.

mod answer_sheet;
mod manage;
mod question;
mod question_preset;
mod record_sheet;
mod survey;
mod user;

pub use answer_sheet::{AnswerDraft, AnswerSheetRepository, SheetDraft, SheetPage, content_digest};
pub use manage::ManageRepository;
pub use question::{QuestionOptionRepository, QuestionRepository};
pub use question_preset::QuestionPresetRepository;
pub use record_sheet::RecordSheetRepository;
pub use survey::{QuestionDraft, SurveyRepository};
pub use user::UserRepository;

use sea_orm::{DbErr, SqlErr};

/// Whether a write failed on a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

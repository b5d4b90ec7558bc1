//! Claim on a unique question's answer content.
//!
//! The unique index over `(survey_id, question_id, content_digest)` makes
//! concurrent submissions of the same content fail at insert time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unique_answer")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub survey_id: String,

    pub question_id: String,

    /// SHA-256 of the answer content, hex encoded
    pub content_digest: String,

    #[sea_orm(indexed)]
    pub answer_sheet_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::answer_sheet::Entity",
        from = "Column::AnswerSheetId",
        to = "super::answer_sheet::Column::Id",
        on_delete = "Cascade"
    )]
    AnswerSheet,
}

impl Related<super::answer_sheet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnswerSheet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

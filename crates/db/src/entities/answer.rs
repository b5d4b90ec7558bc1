//! Answer entity: one question's content within a sheet.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::question::QuestionType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "answer")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub answer_sheet_id: String,

    #[sea_orm(indexed)]
    pub survey_id: String,

    /// May outlive the question after a survey update
    pub question_id: String,

    /// Question type at submission time
    pub question_type: QuestionType,

    /// Order within the sheet
    pub position: i32,

    /// Raw value, or selected labels joined with `┋`
    #[sea_orm(column_type = "Text")]
    pub content: String,
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

//! Question entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use survey_common::MediaKind;

/// Question type. The numeric values are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[sea_orm(num_value = 1)]
    SingleChoice,
    #[sea_orm(num_value = 2)]
    MultiChoice,
    /// Short text whose content may be required to be unique per survey
    #[sea_orm(num_value = 3)]
    FillBlank,
    #[sea_orm(num_value = 4)]
    Paragraph,
    #[sea_orm(num_value = 5)]
    ImageUpload,
    #[sea_orm(num_value = 6)]
    FileUpload,
    #[sea_orm(num_value = 7)]
    Rating,
}

impl QuestionType {
    /// Single- or multi-choice.
    #[must_use]
    pub const fn is_choice(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiChoice)
    }

    /// Where uploaded answer content lives, for upload types.
    #[must_use]
    pub const fn upload_kind(self) -> Option<MediaKind> {
        match self {
            Self::ImageUpload => Some(MediaKind::Image),
            Self::FileUpload => Some(MediaKind::File),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "question")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub survey_id: String,

    /// Display and report order
    pub serial_num: i32,

    #[sea_orm(column_type = "Text")]
    pub subject: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(nullable)]
    pub img: Option<String>,

    pub question_type: QuestionType,

    pub required: bool,

    /// Answer content must be unique across the survey's sheets
    #[sea_orm(column_name = "is_unique")]
    pub unique: bool,

    /// Free-text "other" allowed next to the defined options
    pub other_option: bool,

    #[sea_orm(nullable)]
    pub minimum_option: Option<i32>,

    #[sea_orm(nullable)]
    pub maximum_option: Option<i32>,

    /// Pattern the whole answer must match
    #[sea_orm(nullable)]
    pub reg: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether submissions must be checked for duplicate content.
    #[must_use]
    pub fn requires_unique_content(&self) -> bool {
        self.unique && self.question_type == QuestionType::FillBlank
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::survey::Entity",
        from = "Column::SurveyId",
        to = "super::survey::Column::Id",
        on_delete = "Cascade"
    )]
    Survey,
    #[sea_orm(has_many = "super::question_option::Entity")]
    QuestionOption,
}

impl Related<super::survey::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Survey.def()
    }
}

impl Related<super::question_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuestionOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

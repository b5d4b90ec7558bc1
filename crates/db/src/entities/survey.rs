//! Survey entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored survey status. `expired` is never stored, see [`EffectiveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "paused")]
    Paused,
}

/// Status as seen by respondents and administrators at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Draft,
    Published,
    Paused,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "survey")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner
    #[sea_orm(indexed)]
    pub user_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(nullable)]
    pub img: Option<String>,

    pub status: SurveyStatus,

    pub survey_type: i32,

    /// Max submissions per respondent per day (0 = unlimited)
    pub daily_limit: i32,

    /// Max submissions per respondent overall (0 = unlimited)
    pub sum_limit: i32,

    /// Respondents must hold a verification record
    pub verify: bool,

    /// Stored answer sheets (denormalized)
    #[sea_orm(default_value = 0)]
    pub num: i32,

    pub start_time: DateTimeWithTimeZone,

    pub deadline: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Derive the effective status at `now`.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        if self.deadline < now {
            return EffectiveStatus::Expired;
        }
        match self.status {
            SurveyStatus::Draft => EffectiveStatus::Draft,
            SurveyStatus::Published => EffectiveStatus::Published,
            SurveyStatus::Paused => EffectiveStatus::Paused,
        }
    }

    /// Whether submissions are accepted at `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == EffectiveStatus::Published && self.start_time <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::question::Entity")]
    Question,
    #[sea_orm(has_many = "super::answer_sheet::Entity")]
    AnswerSheet,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Question.def()
    }
}

impl Related<super::answer_sheet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnswerSheet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

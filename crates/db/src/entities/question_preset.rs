//! Named list of preset values reused when building questions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Separator between stored values.
pub const VALUE_SEPARATOR: char = ',';

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "question_preset")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: String,

    /// Values joined with [`VALUE_SEPARATOR`]
    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Stored values in order. An empty list is stored as an empty string.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        if self.value.is_empty() {
            return Vec::new();
        }
        self.value
            .split(VALUE_SEPARATOR)
            .map(str::to_string)
            .collect()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

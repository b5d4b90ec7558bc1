//! Question presets: named value lists administrators reuse as option sets.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use survey_common::{AppError, AppResult, IdGenerator};
use survey_db::entities::question_preset::{self, VALUE_SEPARATOR};
use survey_db::repositories::QuestionPresetRepository;
use validator::Validate;

/// Input for saving a preset.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SavePresetInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 200))]
    pub values: Vec<String>,
}

/// A preset as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPresetView {
    pub name: String,
    pub values: Vec<String>,
}

impl From<question_preset::Model> for QuestionPresetView {
    fn from(model: question_preset::Model) -> Self {
        Self {
            values: model.values(),
            name: model.name,
        }
    }
}

/// Service for question presets.
#[derive(Clone)]
pub struct QuestionPresetService {
    preset_repo: QuestionPresetRepository,
    id_gen: IdGenerator,
}

impl QuestionPresetService {
    /// Create a new question preset service.
    #[must_use]
    pub const fn new(preset_repo: QuestionPresetRepository) -> Self {
        Self {
            preset_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Save a preset. Saving an existing name replaces its values.
    pub async fn save(
        &self,
        input: SavePresetInput,
        now: DateTime<Utc>,
    ) -> AppResult<QuestionPresetView> {
        input.validate()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Preset name is empty".to_string()));
        }
        for value in &input.values {
            if value.trim().is_empty() {
                return Err(AppError::Validation("Preset values cannot be blank".to_string()));
            }
            if value.contains(VALUE_SEPARATOR) {
                return Err(AppError::Validation(format!(
                    "Preset value {value:?} contains '{VALUE_SEPARATOR}'"
                )));
            }
        }

        let model = question_preset::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name.to_string()),
            value: Set(input.values.join(VALUE_SEPARATOR.to_string().as_str())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let saved = self.preset_repo.upsert(model).await?;
        tracing::info!(name = %saved.name, "Question preset saved");
        Ok(saved.into())
    }

    /// Get a preset by name.
    pub async fn get(&self, name: &str) -> AppResult<QuestionPresetView> {
        Ok(self.preset_repo.get_by_name(name.trim()).await?.into())
    }
}

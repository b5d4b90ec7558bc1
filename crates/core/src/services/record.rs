//! Identity verification records.
//!
//! The identity provider is an external collaborator. Once it has verified a
//! respondent it records the result here, which unlocks submission to
//! surveys that require verification.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Deserialize;
use survey_common::{AppError, AppResult, IdGenerator};
use survey_db::entities::record_sheet;
use survey_db::repositories::{RecordSheetRepository, SurveyRepository};
use validator::Validate;

/// A verified respondent.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordVerificationInput {
    #[validate(length(min = 1, max = 64))]
    pub respondent_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Service writing verification records.
#[derive(Clone)]
pub struct VerificationService {
    survey_repo: SurveyRepository,
    record_repo: RecordSheetRepository,
    id_gen: IdGenerator,
}

impl VerificationService {
    /// Create a new verification service.
    #[must_use]
    pub const fn new(survey_repo: SurveyRepository, record_repo: RecordSheetRepository) -> Self {
        Self {
            survey_repo,
            record_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record that a respondent was verified for a survey.
    ///
    /// A later verification of the same respondent refreshes the record.
    pub async fn record_verification(
        &self,
        survey_id: &str,
        input: RecordVerificationInput,
        now: DateTime<Utc>,
    ) -> AppResult<record_sheet::Model> {
        input.validate()?;

        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if !survey.verify {
            return Err(AppError::BadRequest(
                "Survey does not require verification".to_string(),
            ));
        }

        let existing = self
            .record_repo
            .find_by_respondent(survey_id, &input.respondent_id)
            .await?;

        let record = match existing {
            Some(record) => {
                let mut model: record_sheet::ActiveModel = record.into();
                model.name = Set(input.name);
                model.college = Set(input.college);
                model.user_type = Set(input.user_type);
                model.gender = Set(input.gender);
                model.verified_at = Set(now.into());
                self.record_repo.update(model).await?
            }
            None => {
                self.record_repo
                    .create(record_sheet::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        survey_id: Set(survey_id.to_string()),
                        respondent_id: Set(input.respondent_id),
                        name: Set(input.name),
                        college: Set(input.college),
                        user_type: Set(input.user_type),
                        gender: Set(input.gender),
                        verified_at: Set(now.into()),
                    })
                    .await?
            }
        };

        tracing::info!(survey_id = %survey_id, record_id = %record.id, "Respondent verified");
        Ok(record)
    }
}

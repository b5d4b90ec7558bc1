//! Survey lifecycle: create, update and delete of a survey with its content.
//!
//! Updates replace every question and option. Question and option IDs are
//! therefore not stable across an update, and sheets collected before keep
//! referencing the old IDs. Media no longer referenced after an update or
//! delete is removed from storage.
//!
//! Update and delete of one survey are expected to be serialized by the
//! caller. A failure partway through leaves earlier steps in place; the
//! error is surfaced and the operation can be retried as a whole.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use survey_common::{AppError, AppResult, IdGenerator, MediaKind, MediaStorageService};
use survey_db::entities::{
    question::{self, QuestionType},
    question_option,
    survey::{self, SurveyStatus},
    user,
};
use survey_db::repositories::{
    AnswerSheetRepository, QuestionDraft, QuestionOptionRepository, QuestionRepository,
    SurveyRepository,
};
use tracing::{debug, error, info};
use validator::Validate;

use super::aggregation::MULTI_CHOICE_SEPARATOR;
use super::cache::ContentService;

/// Full definition of a survey as written by an administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub description: String,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default = "default_status")]
    pub status: SurveyStatus,
    #[serde(default)]
    pub survey_type: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub daily_limit: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub sum_limit: i32,
    #[serde(default)]
    pub verify: bool,
    pub start_time: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

const fn default_status() -> SurveyStatus {
    SurveyStatus::Draft
}

/// One question of a [`SurveyDefinition`].
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[validate(range(min = 1))]
    pub serial_num: i32,
    #[validate(length(min = 1, max = 1000))]
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub img: Option<String>,
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub other_option: bool,
    #[serde(default)]
    pub minimum_option: Option<i32>,
    #[serde(default)]
    pub maximum_option: Option<i32>,
    #[serde(default)]
    pub reg: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<OptionInput>,
}

/// One option of a [`QuestionInput`].
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    #[validate(range(min = 1))]
    pub serial_num: i32,
    #[validate(length(min = 1, max = 500))]
    pub content: String,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SurveyDefinition {
    /// Cross-field checks not expressible as field validators.
    fn check(&self) -> AppResult<()> {
        if self.deadline <= self.start_time {
            return Err(AppError::Validation(
                "Deadline must be after the start time".to_string(),
            ));
        }

        let mut serials = HashSet::new();
        for q in &self.questions {
            if !serials.insert(q.serial_num) {
                return Err(AppError::Validation(format!(
                    "Duplicate question serial number {}",
                    q.serial_num
                )));
            }
            q.check()?;
        }
        Ok(())
    }

    /// Every media URL the definition references.
    fn images(&self) -> BTreeSet<String> {
        let mut images = BTreeSet::new();
        images.extend(non_empty(self.img.as_deref()));
        for q in &self.questions {
            images.extend(non_empty(q.img.as_deref()));
            for o in &q.options {
                images.extend(non_empty(o.img.as_deref()));
            }
        }
        images
    }
}

impl QuestionInput {
    fn check(&self) -> AppResult<()> {
        let serial = self.serial_num;

        if self.question_type.is_choice() {
            if self.options.is_empty() {
                return Err(AppError::Validation(format!(
                    "Question {serial} needs at least one option"
                )));
            }
        } else if !self.options.is_empty() {
            return Err(AppError::Validation(format!(
                "Question {serial} does not take options"
            )));
        }

        let mut option_serials = HashSet::new();
        let mut contents = HashSet::new();
        for o in &self.options {
            if !option_serials.insert(o.serial_num) {
                return Err(AppError::Validation(format!(
                    "Question {serial} has duplicate option serial number {}",
                    o.serial_num
                )));
            }
            if !contents.insert(o.content.as_str()) {
                return Err(AppError::Validation(format!(
                    "Question {serial} has duplicate option \"{}\"",
                    o.content
                )));
            }
            if o.content.contains(MULTI_CHOICE_SEPARATOR) {
                return Err(AppError::Validation(format!(
                    "Option \"{}\" contains the reserved character {MULTI_CHOICE_SEPARATOR}",
                    o.content
                )));
            }
        }

        if let (Some(min), Some(max)) = (self.minimum_option, self.maximum_option)
            && min > max
        {
            return Err(AppError::Validation(format!(
                "Question {serial} has a minimum selection above its maximum"
            )));
        }

        if let Some(pattern) = self.reg.as_deref().filter(|p| !p.is_empty()) {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                AppError::Validation(format!("Question {serial} has an invalid pattern: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Media referenced by stored question and option rows.
fn content_images(
    survey: &survey::Model,
    questions: &[question::Model],
    options: &[question_option::Model],
) -> BTreeSet<String> {
    let mut images = BTreeSet::new();
    images.extend(non_empty(survey.img.as_deref()));
    images.extend(questions.iter().filter_map(|q| non_empty(q.img.as_deref())));
    images.extend(options.iter().filter_map(|o| non_empty(o.img.as_deref())));
    images
}

/// Service orchestrating a survey's content generations.
#[derive(Clone)]
pub struct SurveyLifecycleService {
    survey_repo: SurveyRepository,
    question_repo: QuestionRepository,
    option_repo: QuestionOptionRepository,
    sheet_repo: AnswerSheetRepository,
    content: ContentService,
    storage: MediaStorageService,
    id_gen: IdGenerator,
}

impl SurveyLifecycleService {
    /// Create a new lifecycle service.
    #[must_use]
    pub const fn new(
        survey_repo: SurveyRepository,
        question_repo: QuestionRepository,
        option_repo: QuestionOptionRepository,
        sheet_repo: AnswerSheetRepository,
        content: ContentService,
        storage: MediaStorageService,
    ) -> Self {
        Self {
            survey_repo,
            question_repo,
            option_repo,
            sheet_repo,
            content,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    fn drafts(
        &self,
        survey_id: &str,
        mut questions: Vec<QuestionInput>,
        now: DateTime<Utc>,
    ) -> Vec<QuestionDraft> {
        questions.sort_by_key(|q| q.serial_num);

        questions
            .into_iter()
            .map(|q| {
                let question_id = self.id_gen.generate();
                let mut options = q.options;
                options.sort_by_key(|o| o.serial_num);

                let options = options
                    .into_iter()
                    .map(|o| question_option::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        question_id: Set(question_id.clone()),
                        survey_id: Set(survey_id.to_string()),
                        serial_num: Set(o.serial_num),
                        content: Set(o.content),
                        img: Set(non_empty(o.img.as_deref())),
                        description: Set(non_empty(o.description.as_deref())),
                    })
                    .collect();

                QuestionDraft {
                    question: question::ActiveModel {
                        id: Set(question_id),
                        survey_id: Set(survey_id.to_string()),
                        serial_num: Set(q.serial_num),
                        subject: Set(q.subject),
                        description: Set(q.description),
                        img: Set(non_empty(q.img.as_deref())),
                        question_type: Set(q.question_type),
                        required: Set(q.required),
                        unique: Set(q.unique),
                        other_option: Set(q.other_option),
                        minimum_option: Set(q.minimum_option),
                        maximum_option: Set(q.maximum_option),
                        reg: Set(non_empty(q.reg.as_deref())),
                        created_at: Set(now.into()),
                    },
                    options,
                }
            })
            .collect()
    }

    /// Create a survey owned by `owner` with its questions and options.
    pub async fn create(
        &self,
        owner: &user::Model,
        definition: SurveyDefinition,
        now: DateTime<Utc>,
    ) -> AppResult<survey::Model> {
        definition.validate()?;
        definition.check()?;
        if definition.status == SurveyStatus::Paused {
            return Err(AppError::Validation(
                "A new survey is either draft or published".to_string(),
            ));
        }

        let images = definition.images();
        let id = self.id_gen.generate();

        let model = survey::ActiveModel {
            id: Set(id.clone()),
            user_id: Set(owner.id.clone()),
            title: Set(definition.title),
            description: Set(definition.description),
            img: Set(non_empty(definition.img.as_deref())),
            status: Set(definition.status),
            survey_type: Set(definition.survey_type),
            daily_limit: Set(definition.daily_limit),
            sum_limit: Set(definition.sum_limit),
            verify: Set(definition.verify),
            num: Set(0),
            start_time: Set(definition.start_time.into()),
            deadline: Set(definition.deadline.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let drafts = self.drafts(&id, definition.questions, now);
        let question_count = drafts.len();

        let survey = self.survey_repo.create_with_content(model, drafts).await?;

        info!(
            survey_id = %survey.id,
            owner_id = %owner.id,
            questions = question_count,
            images = images.len(),
            "Survey created"
        );
        Ok(survey)
    }

    /// Replace a survey's definition.
    ///
    /// Media referenced before but not after the update is removed once the
    /// new content is stored.
    pub async fn update(
        &self,
        survey_id: &str,
        definition: SurveyDefinition,
        now: DateTime<Utc>,
    ) -> AppResult<survey::Model> {
        definition.validate()?;
        definition.check()?;

        let existing = self.survey_repo.get_by_id(survey_id).await?;
        let old_questions = self.question_repo.find_by_survey(survey_id).await?;
        let old_options = self.option_repo.find_by_survey(survey_id).await?;
        let old_images = content_images(&existing, &old_questions, &old_options);
        let new_images = definition.images();

        let mut model: survey::ActiveModel = existing.into();
        model.title = Set(definition.title);
        model.description = Set(definition.description);
        model.img = Set(non_empty(definition.img.as_deref()));
        model.status = Set(definition.status);
        model.survey_type = Set(definition.survey_type);
        model.daily_limit = Set(definition.daily_limit);
        model.sum_limit = Set(definition.sum_limit);
        model.verify = Set(definition.verify);
        model.start_time = Set(definition.start_time.into());
        model.deadline = Set(definition.deadline.into());
        model.updated_at = Set(now.into());

        let drafts = self.drafts(survey_id, definition.questions, now);
        let updated = self.survey_repo.replace_content(model, drafts).await?;
        self.content.invalidate_all().await?;

        let stale: Vec<(MediaKind, String)> = old_images
            .difference(&new_images)
            .map(|url| (MediaKind::Image, url.clone()))
            .collect();
        self.remove_media(survey_id, &stale).await?;

        info!(
            survey_id = %survey_id,
            removed_images = stale.len(),
            "Survey content replaced"
        );
        Ok(updated)
    }

    /// Delete a survey with every row and file belonging to it.
    pub async fn delete(&self, survey_id: &str) -> AppResult<()> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        let questions = self.question_repo.find_by_survey(survey_id).await?;
        let options = self.option_repo.find_by_survey(survey_id).await?;
        let uploads = self.sheet_repo.find_upload_answers_by_survey(survey_id).await?;

        // Files are enumerated before the rows referencing them go away
        let mut images = content_images(&survey, &questions, &options);
        let mut files = BTreeSet::new();
        for answer in &uploads {
            let Some(url) = non_empty(Some(answer.content.as_str())) else {
                continue;
            };
            match answer.question_type.upload_kind() {
                Some(MediaKind::Image) => {
                    images.insert(url);
                }
                Some(_) => {
                    files.insert(url);
                }
                None => {}
            }
        }
        let media: Vec<(MediaKind, String)> = images
            .into_iter()
            .map(|url| (MediaKind::Image, url))
            .chain(files.into_iter().map(|url| (MediaKind::File, url)))
            .collect();

        self.remove_media(survey_id, &media).await?;
        self.survey_repo.delete_cascade(survey_id).await?;
        self.content.invalidate_all().await?;

        info!(survey_id = %survey_id, files = media.len(), "Survey deleted");
        Ok(())
    }

    /// Remove media files, stopping at the first storage failure.
    async fn remove_media(&self, survey_id: &str, media: &[(MediaKind, String)]) -> AppResult<()> {
        let mut removed = Vec::new();
        for (kind, url) in media {
            match self.storage.remove(*kind, url).await {
                Ok(true) => removed.push(url.as_str()),
                Ok(false) => debug!(url = %url, "Media already gone or not ours"),
                Err(e) => {
                    error!(
                        survey_id = %survey_id,
                        url = %url,
                        removed = ?removed,
                        error = %e,
                        "Media cleanup aborted; listed files were already removed"
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

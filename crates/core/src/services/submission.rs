//! Submission intake.
//!
//! Validates an answer set against the survey's questions, applies vote
//! limits and writes the sheet through the answer sheet store. Uniqueness of
//! answers is decided by the store inside the write transaction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use survey_common::{AppError, AppResult, IdGenerator};
use survey_db::entities::{
    answer_sheet,
    question::{self, QuestionType},
    survey,
};
use survey_db::repositories::{
    AnswerDraft, AnswerSheetRepository, QuestionRepository, RecordSheetRepository, SheetDraft,
    SurveyRepository,
};
use tracing::{info, warn};
use validator::Validate;

use super::aggregation::MULTI_CHOICE_SEPARATOR;
use super::cache::ContentService;
use super::notifier::{SubmissionEvent, SubmissionNotifierService};
use super::vote_limit::VoteLimitService;

/// Answers submitted for a survey.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInput {
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

/// One submitted answer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub content: String,
}

/// Who is submitting.
#[derive(Debug, Clone)]
pub struct Respondent {
    /// Identity established by verification, if any.
    pub identity: Option<String>,
    /// Address the request came from.
    pub client_ip: String,
}

impl Respondent {
    fn identity(&self) -> Option<&str> {
        self.identity.as_deref().filter(|id| !id.is_empty())
    }

    /// Key the respondent's sheets are stored under for `survey`.
    ///
    /// Surveys requiring verification only accept an identity; others fall
    /// back to the client address.
    pub fn sheet_key(&self, survey: &survey::Model) -> AppResult<String> {
        match self.identity() {
            Some(identity) => Ok(identity.to_string()),
            None if survey.verify => Err(AppError::Forbidden(
                "This survey requires identity verification".to_string(),
            )),
            None => Ok(self.client_ip.clone()),
        }
    }
}

/// Service accepting answer sheets.
#[derive(Clone)]
pub struct SubmissionService {
    survey_repo: SurveyRepository,
    question_repo: QuestionRepository,
    record_repo: RecordSheetRepository,
    sheet_repo: AnswerSheetRepository,
    content: ContentService,
    vote_limits: VoteLimitService,
    notifier: Option<SubmissionNotifierService>,
    id_gen: IdGenerator,
}

impl SubmissionService {
    /// Create a new submission service.
    #[must_use]
    pub const fn new(
        survey_repo: SurveyRepository,
        question_repo: QuestionRepository,
        record_repo: RecordSheetRepository,
        sheet_repo: AnswerSheetRepository,
        content: ContentService,
        vote_limits: VoteLimitService,
    ) -> Self {
        Self {
            survey_repo,
            question_repo,
            record_repo,
            sheet_repo,
            content,
            vote_limits,
            notifier: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the notifier told about stored sheets.
    pub fn set_notifier(&mut self, notifier: SubmissionNotifierService) {
        self.notifier = Some(notifier);
    }

    /// Submit an answer sheet.
    ///
    /// Vote counters taken for this submission are given back when it fails.
    /// The survey counter and notification are best-effort once the sheet is
    /// stored.
    pub async fn submit(
        &self,
        survey_id: &str,
        input: SubmitInput,
        respondent: Respondent,
        now: DateTime<Utc>,
    ) -> AppResult<answer_sheet::Model> {
        input.validate()?;

        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if !survey.is_open(now) {
            return Err(AppError::BadRequest(
                "Survey is not open for submissions".to_string(),
            ));
        }

        let respondent_id = self.resolve_respondent(&survey, respondent).await?;
        let ticket = self.vote_limits.acquire(&survey, &respondent_id, now).await?;

        let sheet = match self.store(&survey, input, respondent_id, now).await {
            Ok(sheet) => sheet,
            Err(e) => {
                self.vote_limits.release(ticket).await;
                return Err(e);
            }
        };

        info!(survey_id = %survey.id, sheet_id = %sheet.id, "Answer sheet stored");

        if let Err(e) = self.survey_repo.increment_num(&survey.id).await {
            warn!(survey_id = %survey.id, error = %e, "Failed to increment submission counter");
        }

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let event = SubmissionEvent::new(&survey, &sheet);
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&event).await {
                    warn!(
                        survey_id = %event.survey_id,
                        sheet_id = %event.sheet_id,
                        error = %e,
                        "Submission notification failed"
                    );
                }
            });
        }

        Ok(sheet)
    }

    async fn resolve_respondent(
        &self,
        survey: &survey::Model,
        respondent: Respondent,
    ) -> AppResult<String> {
        let key = respondent.sheet_key(survey)?;
        if !survey.verify {
            return Ok(key);
        }

        if self
            .record_repo
            .find_by_respondent(&survey.id, &key)
            .await?
            .is_none()
        {
            return Err(AppError::Forbidden(
                "This survey requires identity verification".to_string(),
            ));
        }
        Ok(key)
    }

    async fn store(
        &self,
        survey: &survey::Model,
        input: SubmitInput,
        respondent_id: String,
        now: DateTime<Utc>,
    ) -> AppResult<answer_sheet::Model> {
        let questions = self.content.questions(&survey.id).await?;
        let by_id: HashMap<&str, &question::Model> =
            questions.iter().map(|q| (q.id.as_str(), q)).collect();

        let mut answered = HashSet::new();
        let mut answers = Vec::with_capacity(input.answers.len());

        for item in input.answers {
            let Some(question) = by_id.get(item.question_id.as_str()).copied() else {
                return Err(self.unknown_question(&item.question_id).await);
            };

            if !answered.insert(question.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "Question {} is answered more than once",
                    question.serial_num
                )));
            }

            check_answer(question, &item.content)?;

            // Blank answers are not stored
            if item.content.trim().is_empty() {
                continue;
            }

            answers.push(AnswerDraft {
                id: self.id_gen.generate(),
                question_id: question.id.clone(),
                question_type: question.question_type,
                content: item.content,
            });
        }

        if let Some(missing) = questions
            .iter()
            .find(|q| q.required && !answered.contains(q.id.as_str()))
        {
            return Err(AppError::Validation(format!(
                "Question {} is required",
                missing.serial_num
            )));
        }

        let unique_question_ids: HashSet<String> = questions
            .iter()
            .filter(|q| q.requires_unique_content())
            .map(|q| q.id.clone())
            .collect();

        let draft = SheetDraft {
            id: self.id_gen.generate(),
            survey_id: survey.id.clone(),
            respondent_id,
            submitted_at: now.into(),
            answers,
        };

        self.sheet_repo.save(draft, &unique_question_ids).await
    }

    /// Error for a question outside the survey's current question set.
    async fn unknown_question(&self, question_id: &str) -> AppError {
        match self.question_repo.find_by_id(question_id).await {
            Ok(Some(_)) => AppError::Validation(format!(
                "Question {question_id} does not belong to this survey"
            )),
            Ok(None) => AppError::NotFound(format!("Question: {question_id}")),
            Err(e) => e,
        }
    }
}

/// Check one answer against its question.
fn check_answer(question: &question::Model, content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        if question.required {
            return Err(AppError::Validation(format!(
                "Question {} is required",
                question.serial_num
            )));
        }
        return Ok(());
    }

    if question.question_type == QuestionType::MultiChoice {
        let selected = content
            .split(MULTI_CHOICE_SEPARATOR)
            .filter(|label| !label.is_empty())
            .count() as i32;

        if let Some(min) = question.minimum_option
            && selected < min
        {
            return Err(AppError::Validation(format!(
                "Question {} needs at least {min} selections",
                question.serial_num
            )));
        }
        if let Some(max) = question.maximum_option
            && max > 0
            && selected > max
        {
            return Err(AppError::Validation(format!(
                "Question {} allows at most {max} selections",
                question.serial_num
            )));
        }
    }

    if let Some(pattern) = question.reg.as_deref().filter(|p| !p.is_empty()) {
        let re = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| AppError::Internal(format!("Invalid stored pattern: {e}")))?;
        if !re.is_match(content) {
            return Err(AppError::Validation(format!(
                "Answer to question {} has an invalid format",
                question.serial_num
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn question(question_type: QuestionType) -> question::Model {
        question::Model {
            id: "q1".to_string(),
            survey_id: "s1".to_string(),
            serial_num: 1,
            subject: "Pick".to_string(),
            description: String::new(),
            img: None,
            question_type,
            required: false,
            unique: false,
            other_option: false,
            minimum_option: None,
            maximum_option: None,
            reg: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_required_blank_is_rejected() {
        let mut q = question(QuestionType::FillBlank);
        assert!(check_answer(&q, "  ").is_ok());

        q.required = true;
        assert!(matches!(check_answer(&q, "  "), Err(AppError::Validation(_))));
        assert!(check_answer(&q, "hello").is_ok());
    }

    #[test]
    fn test_multi_choice_bounds() {
        let mut q = question(QuestionType::MultiChoice);
        q.minimum_option = Some(2);
        q.maximum_option = Some(3);

        assert!(check_answer(&q, "A").is_err());
        assert!(check_answer(&q, "A┋B").is_ok());
        assert!(check_answer(&q, "A┋B┋C").is_ok());
        assert!(check_answer(&q, "A┋B┋C┋D").is_err());
    }

    #[test]
    fn test_pattern_must_match_whole_answer() {
        let mut q = question(QuestionType::FillBlank);
        q.reg = Some(r"\d{10}".to_string());

        assert!(check_answer(&q, "2021001234").is_ok());
        assert!(check_answer(&q, "x2021001234").is_err());
        assert!(check_answer(&q, "20210012345").is_err());
    }

    #[test]
    fn test_alternation_pattern_is_anchored_as_a_whole() {
        let mut q = question(QuestionType::FillBlank);
        q.reg = Some("yes|no".to_string());

        assert!(check_answer(&q, "no").is_ok());
        assert!(check_answer(&q, "yesno").is_err());
        assert!(check_answer(&q, "nope").is_err());
    }

    #[test]
    fn test_respondent_identity_ignores_blank() {
        let respondent = Respondent {
            identity: Some(String::new()),
            client_ip: "10.0.0.1".to_string(),
        };
        assert_eq!(respondent.identity(), None);
    }
}

//! Answer reports: listings, statistics, downloads and sheet removal.

use serde::{Deserialize, Serialize};
use survey_common::{AppError, AppResult, MediaStorageService};
use survey_db::repositories::{AnswerSheetRepository, SurveyRepository};
use tracing::{info, warn};

use super::aggregation::{AnswerRow, QuestionStatistics, aggregate, tabulate};
use super::cache::ContentService;
use super::export::ExportAdapterService;
use super::submission::Respondent;
use super::survey::paging;

/// Input for listing answers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnswersInput {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Keep sheets with an answer containing this text (case-sensitive).
    #[serde(default)]
    pub search_text: String,
    /// Keep only each respondent's latest sheet.
    #[serde(default)]
    pub only_unique: bool,
}

/// One page of answers in table form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPage {
    pub header: Vec<String>,
    pub rows: Vec<AnswerRow>,
    pub total: u64,
}

/// Statistics of a survey.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyStatistics {
    pub survey_id: String,
    /// Sheets counted: the latest of each respondent included.
    pub total_sheets: u64,
    pub questions: Vec<QuestionStatistics>,
}

/// Service producing answer reports.
#[derive(Clone)]
pub struct ReportService {
    survey_repo: SurveyRepository,
    sheet_repo: AnswerSheetRepository,
    content: ContentService,
    exporter: ExportAdapterService,
    storage: MediaStorageService,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(
        survey_repo: SurveyRepository,
        sheet_repo: AnswerSheetRepository,
        content: ContentService,
        exporter: ExportAdapterService,
        storage: MediaStorageService,
    ) -> Self {
        Self {
            survey_repo,
            sheet_repo,
            content,
            exporter,
            storage,
        }
    }

    /// Page through a survey's answers as table rows.
    pub async fn list_answers(
        &self,
        survey_id: &str,
        input: ListAnswersInput,
    ) -> AppResult<AnswerPage> {
        self.survey_repo.get_by_id(survey_id).await?;
        let (page, page_size) = paging(input.page, input.page_size);

        let questions = self.content.questions(survey_id).await?;
        let sheet_page = self
            .sheet_repo
            .query_by_survey(
                survey_id,
                page,
                page_size,
                &input.search_text,
                input.only_unique,
            )
            .await?;

        let sheet_ids: Vec<String> = sheet_page.sheets.iter().map(|s| s.id.clone()).collect();
        let answers = self.sheet_repo.find_answers_for_sheets(&sheet_ids).await?;

        let table = tabulate(
            &questions,
            &sheet_page.sheets,
            &answers,
            (page - 1) * page_size + 1,
        );

        Ok(AnswerPage {
            header: table.header,
            rows: table.rows,
            total: sheet_page.total,
        })
    }

    /// Per-option counts over each respondent's latest sheet.
    pub async fn statistics(&self, survey_id: &str) -> AppResult<SurveyStatistics> {
        self.survey_repo.get_by_id(survey_id).await?;

        let questions = self.content.questions(survey_id).await?;
        let options = self.content.options_by_question(&questions).await?;
        let sheets = self.sheet_repo.find_all_by_survey(survey_id, true).await?;
        let sheet_ids: Vec<String> = sheets.iter().map(|s| s.id.clone()).collect();
        let answers = self.sheet_repo.find_answers_for_sheets(&sheet_ids).await?;

        Ok(SurveyStatistics {
            survey_id: survey_id.to_string(),
            total_sheets: sheets.len() as u64,
            questions: aggregate(&questions, &options, &answers),
        })
    }

    /// Per-option counts over one respondent's latest sheet.
    ///
    /// A respondent without sheets gets every question with zero counts.
    pub async fn respondent_record(
        &self,
        survey_id: &str,
        respondent: &Respondent,
    ) -> AppResult<SurveyStatistics> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        let respondent_id = respondent.sheet_key(&survey)?;

        let questions = self.content.questions(survey_id).await?;
        let options = self.content.options_by_question(&questions).await?;
        let sheets = self
            .sheet_repo
            .find_by_respondent(survey_id, &respondent_id, true)
            .await?;
        let sheet_ids: Vec<String> = sheets.iter().map(|s| s.id.clone()).collect();
        let answers = self.sheet_repo.find_answers_for_sheets(&sheet_ids).await?;

        Ok(SurveyStatistics {
            survey_id: survey_id.to_string(),
            total_sheets: sheets.len() as u64,
            questions: aggregate(&questions, &options, &answers),
        })
    }

    /// Export every latest sheet of a survey and return the download URL.
    pub async fn download(&self, survey_id: &str) -> AppResult<String> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;

        let questions = self.content.questions(survey_id).await?;
        let sheets = self.sheet_repo.find_all_by_survey(survey_id, true).await?;
        let sheet_ids: Vec<String> = sheets.iter().map(|s| s.id.clone()).collect();
        let answers = self.sheet_repo.find_answers_for_sheets(&sheet_ids).await?;

        let table = tabulate(&questions, &sheets, &answers, 1);
        self.exporter.export(&table, &survey.title).await
    }

    /// Delete one sheet of a survey together with its uploaded files.
    pub async fn delete_answer_sheet(&self, survey_id: &str, sheet_id: &str) -> AppResult<()> {
        let sheet = self.sheet_repo.get_by_id(sheet_id).await?;
        if sheet.survey_id != survey_id {
            return Err(AppError::NotFound(format!("Answer sheet: {sheet_id}")));
        }

        let answers = self
            .sheet_repo
            .find_answers_for_sheets(&[sheet.id.clone()])
            .await?;
        for answer in &answers {
            let Some(kind) = answer.question_type.upload_kind() else {
                continue;
            };
            let url = answer.content.trim();
            if url.is_empty() {
                continue;
            }
            if !self.storage.remove(kind, url).await? {
                warn!(sheet_id = %sheet_id, url = %url, "Uploaded file already gone");
            }
        }

        self.sheet_repo.delete_by_id(sheet_id).await?;
        info!(survey_id = %survey_id, sheet_id = %sheet_id, "Answer sheet deleted");
        Ok(())
    }
}

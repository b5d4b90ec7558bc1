//! Aggregation of answer sheets.
//!
//! Two shapes are produced from the same inputs: per-option counts for the
//! statistics view and a flat table with one row per sheet for exports.
//! Both are pure functions over already loaded rows.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use survey_db::entities::{
    answer, answer_sheet,
    question::{self, QuestionType},
    question_option,
};

/// Separator between selected labels in a multi-choice answer.
pub const MULTI_CHOICE_SEPARATOR: &str = "┋";

/// Timestamp format used in tables and exports.
const SUBMITTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Count of one option bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionCount {
    /// Labels that matched no defined option.
    Other { count: u64 },
    /// A defined option.
    #[serde(rename_all = "camelCase")]
    Defined {
        serial_num: i32,
        content: String,
        count: u64,
    },
}

impl OptionCount {
    /// Number of selections in this bucket.
    #[must_use]
    pub const fn count(&self) -> u64 {
        match self {
            Self::Other { count } | Self::Defined { count, .. } => *count,
        }
    }
}

/// Statistics of one question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatistics {
    pub question_id: String,
    pub serial_num: i32,
    pub subject: String,
    pub question_type: QuestionType,
    /// Non-empty answers given to this question.
    pub answered: u64,
    /// Buckets in display order. Empty for non-choice questions.
    pub options: Vec<OptionCount>,
}

impl QuestionStatistics {
    /// Sum over all buckets, "other" included.
    #[must_use]
    pub fn total_selections(&self) -> u64 {
        self.options.iter().map(OptionCount::count).sum()
    }
}

#[derive(Default)]
struct Tally {
    answered: u64,
    other: u64,
    by_content: HashMap<String, u64>,
}

/// Reduce answers to per-option counts.
///
/// Returns one entry per question in serial order, whether or not any answer
/// exists. Labels that match no option by exact content count as "other".
/// Answers to questions not in `questions` are ignored.
#[must_use]
pub fn aggregate(
    questions: &[question::Model],
    options_by_question: &HashMap<String, Vec<question_option::Model>>,
    answers: &[answer::Model],
) -> Vec<QuestionStatistics> {
    let mut tallies: HashMap<&str, Tally> = questions
        .iter()
        .map(|q| (q.id.as_str(), Tally::default()))
        .collect();
    let types: HashMap<&str, QuestionType> = questions
        .iter()
        .map(|q| (q.id.as_str(), q.question_type))
        .collect();

    for answer in answers {
        if answer.content.is_empty() {
            continue;
        }
        let (Some(tally), Some(question_type)) = (
            tallies.get_mut(answer.question_id.as_str()),
            types.get(answer.question_id.as_str()),
        ) else {
            tracing::debug!(
                question_id = %answer.question_id,
                "Skipping answer to a question no longer in the survey"
            );
            continue;
        };

        tally.answered += 1;

        let labels: Vec<&str> = match question_type {
            QuestionType::MultiChoice => answer
                .content
                .split(MULTI_CHOICE_SEPARATOR)
                .filter(|label| !label.is_empty())
                .collect(),
            QuestionType::SingleChoice => vec![answer.content.as_str()],
            _ => continue,
        };

        let defined = options_by_question
            .get(answer.question_id.as_str())
            .map_or(&[][..], Vec::as_slice);
        for label in labels {
            if defined.iter().any(|o| o.content == label) {
                *tally.by_content.entry(label.to_string()).or_default() += 1;
            } else {
                tally.other += 1;
            }
        }
    }

    let mut ordered: Vec<&question::Model> = questions.iter().collect();
    ordered.sort_by_key(|q| q.serial_num);

    ordered
        .into_iter()
        .map(|q| {
            let tally = tallies.remove(q.id.as_str()).unwrap_or_default();
            let mut options = Vec::new();

            if q.question_type.is_choice() {
                if q.other_option || tally.other > 0 {
                    options.push(OptionCount::Other { count: tally.other });
                }

                let mut defined: Vec<&question_option::Model> = options_by_question
                    .get(q.id.as_str())
                    .map(|opts| opts.iter().collect())
                    .unwrap_or_default();
                defined.sort_by_key(|o| o.serial_num);

                options.extend(defined.into_iter().map(|o| OptionCount::Defined {
                    serial_num: o.serial_num,
                    content: o.content.clone(),
                    count: tally.by_content.get(&o.content).copied().unwrap_or(0),
                }));
            }

            QuestionStatistics {
                question_id: q.id.clone(),
                serial_num: q.serial_num,
                subject: q.subject.clone(),
                question_type: q.question_type,
                answered: tally.answered,
                options,
            }
        })
        .collect()
}

/// One sheet as a table row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRow {
    /// 1-based position of the sheet across all pages.
    pub index: u64,
    pub sheet_id: String,
    pub submitted_at: DateTime<FixedOffset>,
    /// One cell per question, in header order.
    pub cells: Vec<String>,
}

/// Answers flattened into rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerTable {
    /// `No.`, `Submitted At`, then question subjects in serial order.
    pub header: Vec<String>,
    pub rows: Vec<AnswerRow>,
}

impl AnswerTable {
    /// Header and rows as plain text records.
    #[must_use]
    pub fn records(&self) -> Vec<Vec<String>> {
        let mut records = Vec::with_capacity(self.rows.len() + 1);
        records.push(self.header.clone());
        for row in &self.rows {
            let mut record = Vec::with_capacity(row.cells.len() + 2);
            record.push(row.index.to_string());
            record.push(row.submitted_at.format(SUBMITTED_AT_FORMAT).to_string());
            record.extend(row.cells.iter().cloned());
            records.push(record);
        }
        records
    }
}

/// Flatten sheets into rows, numbering them from `first_index`.
///
/// A question a sheet did not answer yields an empty cell.
#[must_use]
pub fn tabulate(
    questions: &[question::Model],
    sheets: &[answer_sheet::Model],
    answers: &[answer::Model],
    first_index: u64,
) -> AnswerTable {
    let mut ordered: Vec<&question::Model> = questions.iter().collect();
    ordered.sort_by_key(|q| q.serial_num);

    let mut header = Vec::with_capacity(ordered.len() + 2);
    header.push("No.".to_string());
    header.push("Submitted At".to_string());
    header.extend(ordered.iter().map(|q| q.subject.clone()));

    let mut contents: HashMap<(&str, &str), &str> = HashMap::new();
    for answer in answers {
        contents
            .entry((answer.answer_sheet_id.as_str(), answer.question_id.as_str()))
            .or_insert(answer.content.as_str());
    }

    let rows = sheets
        .iter()
        .zip(first_index..)
        .map(|(sheet, index)| AnswerRow {
            index,
            sheet_id: sheet.id.clone(),
            submitted_at: sheet.submitted_at,
            cells: ordered
                .iter()
                .map(|q| {
                    contents
                        .get(&(sheet.id.as_str(), q.id.as_str()))
                        .map_or_else(String::new, |c| (*c).to_string())
                })
                .collect(),
        })
        .collect();

    AnswerTable { header, rows }
}

//! Export of answer tables to downloadable files.

use std::sync::Arc;

use async_trait::async_trait;
use survey_common::{AppResult, MediaKind, MediaStorageService};

use super::aggregation::AnswerTable;

/// Writer of tabular answer exports.
#[async_trait]
pub trait ExportAdapter: Send + Sync {
    /// Write `table` to a file named after `title_stem` and return its URL.
    async fn export(&self, table: &AnswerTable, title_stem: &str) -> AppResult<String>;
}

/// Shared export adapter handle.
pub type ExportAdapterService = Arc<dyn ExportAdapter>;

/// Exports RFC 4180 CSV into the export root of media storage.
///
/// Files start with a UTF-8 byte order mark so spreadsheet applications pick
/// the right encoding. A later export of the same title replaces the file.
#[derive(Clone)]
pub struct CsvExporter {
    storage: MediaStorageService,
}

impl CsvExporter {
    /// Create a CSV exporter over a media storage.
    #[must_use]
    pub fn new(storage: MediaStorageService) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ExportAdapter for CsvExporter {
    async fn export(&self, table: &AnswerTable, title_stem: &str) -> AppResult<String> {
        let name = format!("{}.csv", file_stem(title_stem));
        let body = encode_csv(&table.records());

        let stored = self
            .storage
            .save(MediaKind::Export, &name, body.as_bytes())
            .await?;

        tracing::info!(file = %name, rows = table.rows.len(), "Answers exported");
        Ok(stored.url)
    }
}

/// File name stem for a survey title.
///
/// Keeps letters and digits of any script; everything else becomes `_`.
#[must_use]
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    if stem.chars().all(|c| c == '_') {
        "export".to_string()
    } else {
        stem
    }
}

fn encode_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Encode records as CSV with CRLF line endings.
#[must_use]
pub fn encode_csv(records: &[Vec<String>]) -> String {
    let mut out = String::from("\u{feff}");
    for record in records {
        let line: Vec<String> = record.iter().map(|f| encode_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Canteen feedback 2026"), "Canteen_feedback_2026");
        assert_eq!(file_stem("../../etc/passwd"), "______etc_passwd");
        assert_eq!(file_stem("食堂满意度调查"), "食堂满意度调查");
        assert_eq!(file_stem("  "), "export");
        assert_eq!(file_stem("???"), "export");
    }

    #[test]
    fn test_encode_csv_quotes_when_needed() {
        let records = vec![
            vec!["No.".to_string(), "Comment".to_string()],
            vec!["1".to_string(), "good, \"very\"\nthanks".to_string()],
        ];

        let csv = encode_csv(&records);

        assert_eq!(
            csv,
            "\u{feff}No.,Comment\r\n1,\"good, \"\"very\"\"\nthanks\"\r\n"
        );
    }
}

//! Submission notifications.
//!
//! Notification is a best-effort side effect of a stored submission. A
//! failing notifier never fails the submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use survey_common::{AppError, AppResult, config::WebhookConfig};
use survey_db::entities::{answer_sheet, survey};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Survey-Signature";

/// Payload describing a stored submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    pub survey_id: String,
    pub survey_title: String,
    pub owner_id: String,
    pub sheet_id: String,
    pub submitted_at: String,
}

impl SubmissionEvent {
    /// Describe a sheet stored for a survey.
    #[must_use]
    pub fn new(survey: &survey::Model, sheet: &answer_sheet::Model) -> Self {
        Self {
            survey_id: survey.id.clone(),
            survey_title: survey.title.clone(),
            owner_id: survey.user_id.clone(),
            sheet_id: sheet.id.clone(),
            submitted_at: sheet.submitted_at.to_rfc3339(),
        }
    }
}

/// Receiver of submission events.
#[async_trait]
pub trait SubmissionNotifier: Send + Sync {
    /// Deliver one event.
    async fn notify(&self, event: &SubmissionEvent) -> AppResult<()>;
}

/// Shared notifier handle.
pub type SubmissionNotifierService = Arc<dyn SubmissionNotifier>;

/// Notifier that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl SubmissionNotifier for NoOpNotifier {
    async fn notify(&self, _event: &SubmissionEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Sign a body with a shared secret, as sent in [`SIGNATURE_HEADER`].
#[must_use]
pub fn sign_payload(secret: &str, body: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Notifier posting signed JSON to a configured endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    secret: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a webhook notifier.
    #[must_use]
    #[allow(clippy::expect_used)] // Client build only fails with incompatible TLS settings
    pub fn new(config: &WebhookConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: config.url.clone(),
            secret: config.secret.clone(),
            http_client,
        }
    }
}

#[async_trait]
impl SubmissionNotifier for WebhookNotifier {
    async fn notify(&self, event: &SubmissionEvent) -> AppResult<()> {
        let body = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("Failed to encode event: {e}")))?;
        let signature = sign_payload(&self.secret, &body);

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header("User-Agent", "survey-rs/0.1")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Webhook returned {}",
                response.status()
            )));
        }

        tracing::debug!(
            survey_id = %event.survey_id,
            sheet_id = %event.sheet_id,
            "Submission webhook delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_payload("secret", r#"{"surveyId":"s1"}"#);
        let b = sign_payload("secret", r#"{"surveyId":"s1"}"#);
        let c = sign_payload("other", r#"{"surveyId":"s1"}"#);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_known_signature() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", "what do ya want for nothing?");
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        let event = SubmissionEvent {
            survey_id: "s1".to_string(),
            survey_title: "t".to_string(),
            owner_id: "u1".to_string(),
            sheet_id: "a1".to_string(),
            submitted_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        assert!(NoOpNotifier.notify(&event).await.is_ok());
    }
}

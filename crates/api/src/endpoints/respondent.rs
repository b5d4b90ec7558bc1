//! Respondent endpoints: reading an open survey, submitting, the caller's
//! own answer record and uploads.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use survey_common::{AppError, AppResult};
use survey_core::services::media::MAX_FILE_SIZE;
use survey_core::{
    RecordVerificationInput, Respondent, SubmitInput, SurveyDetail, SurveyStatistics,
    UploadedMedia,
};

use super::SurveyIdRequest;
use crate::{
    extractors::{AuthUser, ClientIp, RespondentIdentity},
    middleware::AppState,
    response::ApiResponse,
};

/// Submit request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub survey_id: String,
    #[serde(flatten)]
    pub input: SubmitInput,
}

/// Stored submission.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub sheet_id: String,
    pub submitted_at: String,
}

/// Verification record request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub survey_id: String,
    #[serde(flatten)]
    pub record: RecordVerificationInput,
}

/// Verification record response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub record_id: String,
    pub verified_at: String,
}

/// Show a survey that is currently accepting answers.
async fn show(
    State(state): State<AppState>,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<SurveyDetail>> {
    let detail = state
        .survey_service
        .get_published(&req.survey_id, Utc::now())
        .await?;
    Ok(ApiResponse::ok(detail))
}

async fn submit(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    RespondentIdentity(identity): RespondentIdentity,
    Json(req): Json<SubmitRequest>,
) -> AppResult<ApiResponse<SubmitResponse>> {
    let sheet = state
        .submission_service
        .submit(
            &req.survey_id,
            req.input,
            Respondent {
                identity,
                client_ip,
            },
            Utc::now(),
        )
        .await?;

    Ok(ApiResponse::ok(SubmitResponse {
        sheet_id: sheet.id,
        submitted_at: sheet.submitted_at.to_rfc3339(),
    }))
}

/// Option counts over the caller's latest sheet.
async fn record(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    RespondentIdentity(identity): RespondentIdentity,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<SurveyStatistics>> {
    let record = state
        .report_service
        .respondent_record(
            &req.survey_id,
            &Respondent {
                identity,
                client_ip,
            },
        )
        .await?;
    Ok(ApiResponse::ok(record))
}

/// Record a verified respondent. Called by the identity gateway with an
/// administrator token.
async fn verify(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> AppResult<ApiResponse<VerifyResponse>> {
    let record = state
        .verification_service
        .record_verification(&req.survey_id, req.record, Utc::now())
        .await?;

    Ok(ApiResponse::ok(VerifyResponse {
        record_id: record.id,
        verified_at: record.verified_at.to_rfc3339(),
    }))
}

/// Read the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        return Ok((file_name, data.to_vec()));
    }

    Err(AppError::BadRequest("Missing file field".to_string()))
}

async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<UploadedMedia>> {
    let (file_name, data) = read_upload(multipart).await?;
    let uploaded = state.media_service.upload_image(&file_name, &data).await?;
    Ok(ApiResponse::ok(uploaded))
}

async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<UploadedMedia>> {
    let (file_name, data) = read_upload(multipart).await?;
    let uploaded = state.media_service.upload_file(&file_name, &data).await?;
    Ok(ApiResponse::ok(uploaded))
}

pub fn router() -> Router<AppState> {
    // Multipart framing on top of the largest accepted upload
    let upload_limit = DefaultBodyLimit::max(MAX_FILE_SIZE + 64 * 1024);

    Router::new()
        .route("/survey/show", post(show))
        .route("/survey/submit", post(submit))
        .route("/survey/record", post(record))
        .route("/survey/verify", post(verify))
        .route("/upload/img", post(upload_image).layer(upload_limit))
        .route("/upload/file", post(upload_file).layer(upload_limit))
}

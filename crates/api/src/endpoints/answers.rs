//! Answer report endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use survey_common::AppResult;
use survey_core::{AnswerPage, ListAnswersInput, SurveyStatistics};

use super::SurveyIdRequest;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List answers request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnswersRequest {
    pub survey_id: String,
    #[serde(flatten)]
    pub query: ListAnswersInput,
}

/// Delete answer sheet request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    pub survey_id: String,
    pub sheet_id: String,
}

/// Download response.
#[derive(Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

/// Page through submitted sheets.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListAnswersRequest>,
) -> AppResult<ApiResponse<AnswerPage>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let page = state
        .report_service
        .list_answers(&req.survey_id, req.query)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Per-option counts.
async fn statistics(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<SurveyStatistics>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let stats = state.report_service.statistics(&req.survey_id).await?;
    Ok(ApiResponse::ok(stats))
}

/// Export all latest sheets and return the file URL.
async fn download(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<DownloadResponse>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let url = state.report_service.download(&req.survey_id).await?;
    Ok(ApiResponse::ok(DownloadResponse { url }))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteSheetRequest>,
) -> AppResult<ApiResponse<()>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    state
        .report_service
        .delete_answer_sheet(&req.survey_id, &req.sheet_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list))
        .route("/statistics", post(statistics))
        .route("/download", post(download))
        .route("/delete", post(delete))
}

//! Question preset endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::Deserialize;
use survey_common::AppResult;
use survey_core::{QuestionPresetView, SavePresetInput};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Preset lookup request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPresetRequest {
    pub name: String,
}

async fn create(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SavePresetInput>,
) -> AppResult<ApiResponse<QuestionPresetView>> {
    let preset = state.preset_service.save(req, Utc::now()).await?;
    Ok(ApiResponse::ok(preset))
}

async fn get(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GetPresetRequest>,
) -> AppResult<ApiResponse<QuestionPresetView>> {
    let preset = state.preset_service.get(&req.name).await?;
    Ok(ApiResponse::ok(preset))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/get", post(get))
}

//! Survey administration endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use survey_common::AppResult;
use survey_core::{ListSurveysInput, SurveyDefinition, SurveyDetail, SurveyPage};
use survey_db::entities::survey::{self, EffectiveStatus, SurveyStatus};

use super::SurveyIdRequest;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Survey response without content.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: SurveyStatus,
    pub effective_status: EffectiveStatus,
    pub num: i32,
    pub start_time: String,
    pub deadline: String,
    pub updated_at: String,
}

impl From<survey::Model> for SurveyResponse {
    fn from(s: survey::Model) -> Self {
        Self {
            effective_status: s.effective_status(Utc::now()),
            id: s.id,
            user_id: s.user_id,
            title: s.title,
            status: s.status,
            num: s.num,
            start_time: s.start_time.to_rfc3339(),
            deadline: s.deadline.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

/// Update survey request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSurveyRequest {
    pub survey_id: String,
    #[serde(flatten)]
    pub definition: SurveyDefinition,
}

/// Update status request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub survey_id: String,
    pub status: SurveyStatus,
}

/// Create a survey owned by the caller.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SurveyDefinition>,
) -> AppResult<ApiResponse<SurveyResponse>> {
    let survey = state
        .lifecycle_service
        .create(&user, req, Utc::now())
        .await?;

    Ok(ApiResponse::ok(survey.into()))
}

/// Replace a survey's definition and content.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateSurveyRequest>,
) -> AppResult<ApiResponse<SurveyResponse>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let survey = state
        .lifecycle_service
        .update(&req.survey_id, req.definition, Utc::now())
        .await?;

    Ok(ApiResponse::ok(survey.into()))
}

/// Delete a survey with everything it owns.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state.permission_service.check(&user, &req.survey_id).await?;
    state.lifecycle_service.delete(&req.survey_id).await?;

    Ok(ApiResponse::ok(()))
}

/// Change the stored status.
async fn status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<ApiResponse<SurveyResponse>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let survey = state
        .survey_service
        .update_status(&req.survey_id, req.status, Utc::now())
        .await?;

    Ok(ApiResponse::ok(survey.into()))
}

/// List surveys visible to the caller.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListSurveysInput>,
) -> AppResult<ApiResponse<SurveyPage>> {
    let page = state.survey_service.list(&user, req, Utc::now()).await?;
    Ok(ApiResponse::ok(page))
}

/// Show a survey with its questions and options.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SurveyIdRequest>,
) -> AppResult<ApiResponse<SurveyDetail>> {
    state.permission_service.check(&user, &req.survey_id).await?;

    let detail = state.survey_service.get(&req.survey_id, Utc::now()).await?;
    Ok(ApiResponse::ok(detail))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/delete", post(delete))
        .route("/status", post(status))
        .route("/list", post(list))
        .route("/show", post(show))
}

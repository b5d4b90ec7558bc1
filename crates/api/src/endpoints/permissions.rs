//! Manage grants and administrator accounts.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use survey_common::AppResult;
use survey_core::{CreateAdminInput, CreatedAdmin};
use survey_db::entities::manage;

use crate::{
    extractors::{AuthUser, SuperAdmin},
    middleware::AppState,
    response::ApiResponse,
};

/// Grant or revoke request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub survey_id: String,
    pub username: String,
}

/// Manage grant response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub id: String,
    pub user_id: String,
    pub survey_id: String,
    pub created_at: String,
}

impl From<manage::Model> for GrantResponse {
    fn from(m: manage::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            survey_id: m.survey_id,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Let another administrator manage a survey.
async fn grant(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> AppResult<ApiResponse<GrantResponse>> {
    let grant = state
        .permission_service
        .grant(&user, &req.survey_id, &req.username)
        .await?;

    Ok(ApiResponse::ok(grant.into()))
}

async fn revoke(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .permission_service
        .revoke(&user, &req.survey_id, &req.username)
        .await?;

    Ok(ApiResponse::ok(()))
}

/// Grants held by the caller.
async fn managed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<GrantResponse>>> {
    let grants = state.permission_service.list_managed(&user).await?;
    Ok(ApiResponse::ok(grants.into_iter().map(Into::into).collect()))
}

/// Create an administrator. Super admins only.
async fn create_admin(
    SuperAdmin(_): SuperAdmin,
    State(state): State<AppState>,
    Json(req): Json<CreateAdminInput>,
) -> AppResult<ApiResponse<CreatedAdmin>> {
    let created = state.user_service.create_admin(req).await?;
    Ok(ApiResponse::ok(created))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/permission/grant", post(grant))
        .route("/permission/revoke", post(revoke))
        .route("/permission/managed", post(managed))
        .route("/user/create", post(create_admin))
}

//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use survey_core::{
    MediaService, PermissionService, QuestionPresetService, ReportService, SubmissionService,
    SurveyLifecycleService, SurveyService, UserService, VerificationService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub survey_service: SurveyService,
    pub lifecycle_service: SurveyLifecycleService,
    pub submission_service: SubmissionService,
    pub report_service: ReportService,
    pub permission_service: PermissionService,
    pub verification_service: VerificationService,
    pub media_service: MediaService,
    pub preset_service: QuestionPresetService,
}

/// Authentication middleware.
///
/// A valid bearer token attaches the administrator to the request. Anything
/// else passes through anonymously; routes that need an administrator reject
/// it through the `AuthUser` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => tracing::debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}

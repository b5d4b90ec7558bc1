//! API endpoints.

mod answers;
mod permissions;
mod presets;
mod respondent;
mod surveys;

use axum::Router;
use serde::Deserialize;

use crate::middleware::AppState;

/// Request naming a single survey.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyIdRequest {
    /// Survey to act on.
    pub survey_id: String,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/admin",
            Router::new()
                .nest("/survey", surveys::router())
                .nest("/answers", answers::router())
                .nest("/question/pre", presets::router())
                .merge(permissions::router()),
        )
        .nest("/user", respondent::router())
}

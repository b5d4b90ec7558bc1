//! HTTP API layer for the survey service.
//!
//! - **Endpoints**: administrator routes under `/admin`, respondent routes under `/user`
//! - **Extractors**: authenticated administrator, client address
//! - **Middleware**: bearer-token authentication, per-IP rate limiting
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;

use axum::Router;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
pub use rate_limit::{ApiRateLimiter, RateLimitConfig, RateLimiterState, rate_limit_middleware};

/// The API under `/api` with authentication and rate limiting applied.
pub fn app(state: AppState, rate_limiter: RateLimiterState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .with_state(state)
}

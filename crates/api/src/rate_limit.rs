//! Per-IP request rate limiting.
//!
//! Guards the whole API with a fixed-window counter per client address.
//! Vote limits on submissions are a separate business rule.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use survey_common::config::LimitsConfig;
use tokio::sync::RwLock;

use crate::extractors::client_ip;

/// Rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Time window duration in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Per-minute limit from the service limits.
    #[must_use]
    pub const fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.requests_per_minute, 60)
    }
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }
}

/// Fixed-window request counter keyed by client.
#[derive(Clone)]
pub struct ApiRateLimiter {
    states: Arc<RwLock<HashMap<String, WindowState>>>,
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check if a request is allowed and record it.
    pub async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let window = Duration::from_secs(config.window_secs);

        let state = states.entry(key.to_string()).or_insert_with(WindowState::new);

        if now.duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = now;
        }

        let reset = window
            .saturating_sub(now.duration_since(state.window_start))
            .as_secs();

        if state.count >= config.max_requests {
            return RateLimitResult::Limited { retry_after: reset };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: config.max_requests.saturating_sub(state.count),
            limit: config.max_requests,
            reset,
        }
    }

    /// Drop windows that ended at least one full window ago.
    pub async fn cleanup(&self, window_secs: u64) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let max_age = Duration::from_secs(window_secs * 2);

        states.retain(|_, state| now.duration_since(state.window_start) < max_age);
    }

    /// Number of tracked clients.
    pub async fn key_count(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Rate limit check result.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed {
        /// Remaining requests in window.
        remaining: u32,
        /// Total limit.
        limit: u32,
        /// Seconds until window reset.
        reset: u64,
    },
    /// Request is rate limited.
    Limited {
        /// Seconds until the window resets.
        retry_after: u64,
    },
}

/// Rate limiter state for the middleware.
#[derive(Clone)]
pub struct RateLimiterState {
    pub limiter: ApiRateLimiter,
    pub config: RateLimitConfig,
}

impl RateLimiterState {
    /// Create a new rate limiter state.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: ApiRateLimiter::new(),
            config,
        }
    }
}

/// Rate limit error response.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "RATE_LIMIT_EXCEEDED",
                "message": "Too many requests",
                "retryAfter": self.retry_after
            }
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("Retry-After", self.retry_after.to_string()),
                ("Content-Type", "application/json".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(state): State<RateLimiterState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    let key = client_ip(req.headers(), req.extensions())
        .map_or_else(|| "unknown".to_string(), |ip| format!("ip:{ip}"));

    match state.limiter.check(&key, &state.config).await {
        RateLimitResult::Allowed {
            remaining,
            limit,
            reset,
        } => {
            let mut response = next.run(req).await;

            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());
            headers.insert("X-RateLimit-Reset", reset.into());

            Ok(response)
        }
        RateLimitResult::Limited { retry_after } => {
            tracing::debug!(key = %key, retry_after, "Request rate limited");
            Err(RateLimitError { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new(3, 60);

        for expected_remaining in [2, 1, 0] {
            match limiter.check("ip:10.0.0.1", &config).await {
                RateLimitResult::Allowed { remaining, limit, reset } => {
                    assert_eq!(remaining, expected_remaining);
                    assert_eq!(limit, 3);
                    assert!(reset <= 60);
                }
                RateLimitResult::Limited { .. } => panic!("Expected Allowed"),
            }
        }

        match limiter.check("ip:10.0.0.1", &config).await {
            RateLimitResult::Limited { retry_after } => assert!(retry_after <= 60),
            RateLimitResult::Allowed { .. } => panic!("Expected Limited"),
        }
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new(1, 60);

        limiter.check("ip:10.0.0.1", &config).await;

        assert!(matches!(
            limiter.check("ip:10.0.0.2", &config).await,
            RateLimitResult::Allowed { .. }
        ));
        assert_eq!(limiter.key_count().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_windows() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new(10, 60);

        limiter.check("ip:10.0.0.1", &config).await;
        limiter.cleanup(60).await;

        assert_eq!(limiter.key_count().await, 1);
    }
}

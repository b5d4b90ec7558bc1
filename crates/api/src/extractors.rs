//! Request extractors.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};
use survey_common::AppError;
use survey_db::entities::user;

/// Authenticated administrator extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Authenticated super admin extractor.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub user::Model);

impl<S> FromRequestParts<S> for SuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_super_admin {
            return Err(AppError::Forbidden("Super admin required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Address of the requesting client.
///
/// Falls back to `"unknown"` when neither a forwarding header nor the peer
/// address is available.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            client_ip(&parts.headers, &parts.extensions)
                .map_or_else(|| "unknown".to_string(), |ip| ip.to_string()),
        ))
    }
}

/// Header an upstream identity gateway sets for verified respondents.
pub const RESPONDENT_HEADER: &str = "x-respondent-id";

/// Identity of a verified respondent, when present.
#[derive(Debug, Clone)]
pub struct RespondentIdentity(pub Option<String>);

impl<S> FromRequestParts<S> for RespondentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(RESPONDENT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string),
        ))
    }
}

/// Resolve the client address from proxy headers or the peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    if let Some(xff) = headers.get("x-forwarded-for")
        && let Ok(xff) = xff.to_str()
        && let Some(first) = xff.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(real_ip) = real_ip.to_str()
        && let Ok(ip) = real_ip.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.8"));

        let ip = client_ip(&headers, &Extensions::new());
        assert_eq!(ip, "10.0.0.7".parse().ok());
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 2], 4000))));

        let ip = client_ip(&HeaderMap::new(), &extensions);
        assert_eq!(ip, "192.168.1.2".parse().ok());
    }

    #[test]
    fn test_garbage_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        assert!(client_ip(&headers, &Extensions::new()).is_none());
    }
}

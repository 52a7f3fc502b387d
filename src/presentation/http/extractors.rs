//! Custom Extractors
//!
//! Axum extractors for the authenticated caller and request metadata.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use axum_extra::headers::{HeaderMapExt, UserAgent};

use crate::application::services::ClientInfo;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;

/// The caller placed in the extensions by `auth_middleware`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// User agent and client address, stored on refresh sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .typed_get::<UserAgent>()
            .map(|ua| ua.as_str().chars().take(512).collect());

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        });

        Ok(ClientMeta(ClientInfo {
            user_agent,
            ip_address,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::USER_AGENT, Request};

    #[tokio::test]
    async fn test_client_meta_reads_headers() {
        let (mut parts, _) = Request::builder()
            .header(USER_AGENT, "Mozilla/5.0")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();

        let ClientMeta(info) = ClientMeta::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_missing_auth_user_is_unauthorized() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}

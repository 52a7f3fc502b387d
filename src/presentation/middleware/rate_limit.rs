//! Rate Limiting Middleware
//!
//! Redis sliding-window limiter. Authentication endpoints get a strict
//! budget, the rest of the API a moderate one. When Redis is not configured
//! the limiter is skipped; when Redis fails the request is let through.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::infrastructure::cache::keys;
use crate::presentation::middleware::auth::AuthUser;
use crate::shared::error::ErrorResponse;
use crate::startup::AppState;

const WINDOW_SECONDS: u64 = 60;

// ZSET of request timestamps per identifier. Returns
// {allowed, count, retry_after_ms}.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_start = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local window_seconds = tonumber(ARGV[4])

redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
local count = redis.call('ZCARD', key)

if count < max_requests then
    redis.call('ZADD', key, now_ms, now_ms .. ':' .. math.random(1000000))
    redis.call('EXPIRE', key, window_seconds + 1)
    return {1, count + 1, 0}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local retry_after = 0
if oldest and #oldest >= 2 then
    retry_after = oldest[2] + (window_seconds * 1000) - now_ms
end
return {0, count, retry_after}
"#;

/// Which budget a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    /// Login, registration and token refresh
    Auth,
    Api,
}

impl EndpointType {
    fn bucket(&self) -> &'static str {
        match self {
            EndpointType::Auth => "auth",
            EndpointType::Api => "api",
        }
    }

    /// Requests allowed per window, burst included.
    pub fn max_requests(&self, settings: &RateLimitSettings) -> u32 {
        let base = match self {
            EndpointType::Auth => settings.auth_requests_per_minute,
            EndpointType::Api => settings.api_requests_per_minute,
        };
        base.saturating_add(settings.burst_size)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (seconds) when the window resets
    pub reset_at: i64,
    /// Seconds until a request would be accepted again
    pub retry_after: u64,
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    endpoint_type: EndpointType,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager, endpoint_type: EndpointType, settings: &RateLimitSettings) -> Self {
        Self {
            redis,
            endpoint_type,
            max_requests: endpoint_type.max_requests(settings),
        }
    }

    /// `Ok` when the request may proceed, `Err` when it is over the limit.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        let key = keys::rate_limit(self.endpoint_type.bucket(), identifier);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = (WINDOW_SECONDS * 1000) as i64;
        let reset_at = now_ms / 1000 + WINDOW_SECONDS as i64;

        let mut conn = self.redis.clone();
        let result: Result<Vec<i64>, _> = redis::Script::new(SLIDING_WINDOW_SCRIPT)
            .key(&key)
            .arg(now_ms)
            .arg(now_ms - window_ms)
            .arg(self.max_requests as i64)
            .arg(WINDOW_SECONDS as i64)
            .invoke_async(&mut conn)
            .await;

        let result = match result {
            Ok(result) if result.len() >= 3 => result,
            Ok(result) => {
                tracing::error!(?result, "Unexpected rate limiter reply, allowing request");
                return Ok(self.unlimited(reset_at));
            }
            Err(e) => {
                tracing::error!(error = %e, "Rate limiter Redis error, allowing request");
                return Ok(self.unlimited(reset_at));
            }
        };

        let info = RateLimitInfo {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(result[1].max(0) as u32),
            reset_at,
            retry_after: retry_after_seconds(result[2]),
        };

        if result[0] == 1 {
            Ok(info)
        } else {
            Err(RateLimitInfo { remaining: 0, ..info })
        }
    }

    fn unlimited(&self, reset_at: i64) -> RateLimitInfo {
        RateLimitInfo {
            limit: self.max_requests,
            remaining: self.max_requests,
            reset_at,
            retry_after: 0,
        }
    }
}

fn retry_after_seconds(retry_ms: i64) -> u64 {
    if retry_ms <= 0 {
        0
    } else {
        (retry_ms as u64).div_ceil(1000)
    }
}

/// Authenticated user id first, then the proxy headers, then the peer address.
///
/// `X-Forwarded-For` is only meaningful behind a trusted proxy.
fn extract_identifier(request: &Request, client_ip: Option<IpAddr>) -> String {
    if let Some(auth_user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", auth_user.user_id);
    }

    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    for candidate in [forwarded, real_ip].into_iter().flatten() {
        if let Ok(ip) = candidate.trim().parse::<IpAddr>() {
            return format!("ip:{}", ip);
        }
    }

    match client_ip {
        Some(ip) => format!("ip:{}", ip),
        None => {
            tracing::warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        }
    }
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Auth).await
}

pub async fn rate_limit_api(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Api).await
}

async fn rate_limit_inner(
    state: AppState,
    request: Request,
    next: Next,
    endpoint_type: EndpointType,
) -> Response {
    let settings = &state.settings.rate_limit;
    let redis = match (&state.redis, settings.enabled) {
        (Some(redis), true) => redis.clone(),
        _ => return next.run(request).await,
    };

    // Present when served with `into_make_service_with_connect_info`
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identifier = extract_identifier(&request, peer);
    let limiter = RateLimiter::new(redis, endpoint_type, settings);

    match limiter.check(&identifier).await {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            tracing::warn!(identifier = %identifier, ?endpoint_type, "Rate limit exceeded");
            rate_limited_response(info)
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    for (name, value) in [
        ("x-ratelimit-limit", info.limit.to_string()),
        ("x-ratelimit-remaining", info.remaining.to_string()),
        ("x-ratelimit-reset", info.reset_at.to_string()),
    ] {
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert(name, v);
        }
    }
}

fn rate_limited_response(info: RateLimitInfo) -> Response {
    let mut headers = HeaderMap::new();
    add_rate_limit_headers(&mut headers, &info);
    if let Ok(v) = HeaderValue::from_str(&info.retry_after.to_string()) {
        headers.insert(header::RETRY_AFTER, v);
    }

    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: 10006,
            message: "Too many requests, please slow down".to_string(),
            errors: None,
        },
        rate_limit: info,
    };

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::collections::BTreeSet;

    fn create_test_settings() -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            auth_requests_per_minute: 10,
            api_requests_per_minute: 300,
            burst_size: 5,
        }
    }

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    // =========================================================================
    // Limits
    // =========================================================================

    #[test]
    fn test_auth_budget_is_stricter() {
        let settings = create_test_settings();
        assert_eq!(EndpointType::Auth.max_requests(&settings), 15);
        assert_eq!(EndpointType::Api.max_requests(&settings), 305);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_seconds(-5), 0);
        assert_eq!(retry_after_seconds(0), 0);
        assert_eq!(retry_after_seconds(1), 1);
        assert_eq!(retry_after_seconds(1000), 1);
        assert_eq!(retry_after_seconds(1001), 2);
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    #[test]
    fn test_identifier_prefers_authenticated_user() {
        let mut request = request_with(&[("x-forwarded-for", "10.0.0.1")]);
        request.extensions_mut().insert(AuthUser {
            user_id: 42,
            company_id: 1,
            username: "ali".into(),
            roles: vec![],
            permissions: BTreeSet::new(),
        });
        assert_eq!(extract_identifier(&request, None), "user:42");
    }

    #[test]
    fn test_identifier_uses_first_forwarded_address() {
        let request = request_with(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(extract_identifier(&request, None), "ip:203.0.113.7");
    }

    #[test]
    fn test_identifier_ignores_garbage_headers() {
        let request = request_with(&[("x-forwarded-for", "not-an-ip"), ("x-real-ip", "also bad")]);
        let peer: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(extract_identifier(&request, Some(peer)), "ip:192.0.2.1");
        assert_eq!(extract_identifier(&request, None), "ip:unknown");
    }

    // =========================================================================
    // Responses
    // =========================================================================

    #[test]
    fn test_rate_limited_response_headers() {
        let response = rate_limited_response(RateLimitInfo {
            limit: 15,
            remaining: 0,
            reset_at: 1_700_000_000,
            retry_after: 12,
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "12");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "15");
    }
}

//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsSettings;

/// Build the CORS layer. An empty or `*` origin list allows any origin.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty() && *o != "*")
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        // The client reads the PDF file name from it
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn preflight(allowed: &[&str], origin: &str) -> Option<HeaderValue> {
        let settings = CorsSettings {
            allowed_origins: allowed.iter().map(|o| o.to_string()).collect(),
        };
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(create_cors_layer(&settings));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).cloned()
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let allowed = preflight(&["http://localhost:4200"], "http://localhost:4200").await;
        assert_eq!(allowed.unwrap(), "http://localhost:4200");
    }

    #[tokio::test]
    async fn test_unlisted_origin_is_not_echoed() {
        let allowed = preflight(&["http://localhost:4200"], "http://evil.test").await;
        assert!(allowed.is_none());
    }

    #[tokio::test]
    async fn test_wildcard_allows_any() {
        let allowed = preflight(&["*"], "http://anything.test").await;
        assert_eq!(allowed.unwrap(), "*");
    }
}

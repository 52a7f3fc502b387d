//! Security Headers Middleware
//!
//! Stamps a fixed set of security headers on every response. The header
//! values are rendered once when the layer is built and copied onto each
//! response.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response},
};
use tower::{Layer, Service};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Security headers configuration
#[derive(Clone, Debug)]
pub struct SecurityHeadersConfig {
    /// Send `Strict-Transport-Security`; only meaningful behind HTTPS
    pub enable_hsts: bool,
    pub hsts_max_age: u64,
    pub content_security_policy: String,
    pub referrer_policy: String,
    pub permissions_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enable_hsts: true,
            hsts_max_age: 31_536_000,
            // The API serves JSON, PDFs and uploaded files; nothing embeds or runs scripts.
            content_security_policy: "default-src 'none'; frame-ancestors 'none'".to_string(),
            referrer_policy: "no-referrer".to_string(),
            permissions_policy: "geolocation=(), microphone=(), camera=()".to_string(),
        }
    }
}

impl SecurityHeadersConfig {
    /// HSTS is only sent in production.
    pub fn for_environment(environment: &str) -> Self {
        Self {
            enable_hsts: environment.eq_ignore_ascii_case("production"),
            ..Self::default()
        }
    }

    fn render(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

        if self.enable_hsts {
            let hsts = format!("max-age={}; includeSubDomains", self.hsts_max_age);
            if let Ok(value) = HeaderValue::from_str(&hsts) {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, value);
            }
        }

        for (name, value) in [
            (header::CONTENT_SECURITY_POLICY, &self.content_security_policy),
            (header::REFERRER_POLICY, &self.referrer_policy),
            (PERMISSIONS_POLICY, &self.permissions_policy),
        ] {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => tracing::warn!(header = %name, "Skipping invalid security header value"),
            }
        }

        headers
    }
}

/// Layer that adds security headers to responses
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    headers: Arc<HeaderMap>,
}

impl SecurityHeadersLayer {
    pub fn new(config: &SecurityHeadersConfig) -> Self {
        Self {
            headers: Arc::new(config.render()),
        }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            headers: self.headers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    headers: Arc<HeaderMap>,
}

impl<S> Service<Request<Body>> for SecurityHeadersMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone may not be ready; keep the instance that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let headers = self.headers.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            let target = response.headers_mut();
            for (name, value) in headers.iter() {
                // Handlers may set a stricter value themselves (e.g. file downloads).
                if !target.contains_key(name) {
                    target.insert(name.clone(), value.clone());
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    async fn headers_for(config: SecurityHeadersConfig) -> HeaderMap {
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(SecurityHeadersLayer::new(&config));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let headers = headers_for(SecurityHeadersConfig::for_environment("production")).await;

        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(
            headers.get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(
            headers.get(header::CONTENT_SECURITY_POLICY).unwrap(),
            "default-src 'none'; frame-ancestors 'none'"
        );
        assert_eq!(headers.get(header::REFERRER_POLICY).unwrap(), "no-referrer");
        assert!(headers.contains_key(PERMISSIONS_POLICY));
    }

    #[tokio::test]
    async fn test_no_hsts_outside_production() {
        let headers = headers_for(SecurityHeadersConfig::for_environment("development")).await;

        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    }

    #[tokio::test]
    async fn test_invalid_value_is_skipped() {
        let headers = headers_for(SecurityHeadersConfig {
            referrer_policy: "bad\nvalue".into(),
            ..SecurityHeadersConfig::default()
        })
        .await;

        assert!(headers.get(header::REFERRER_POLICY).is_none());
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    }
}

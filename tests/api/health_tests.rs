//! Health and Global Layer Tests

use axum::http::{header, StatusCode};

use crate::common::{json_body, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = TestApp::new();

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["checks"]["database"]["status"], "unhealthy");
    assert_eq!(json["checks"]["redis"]["status"], "disabled");
}

#[tokio::test]
async fn test_metrics_endpoint_is_prometheus_text() {
    let app = TestApp::new();

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new();

    for uri in ["/health", "/api/users/me", "/does-not-exist"] {
        let response = app.get(uri).await;
        let headers = response.headers();

        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff", "{}", uri);
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY", "{}", uri);
        // The test settings run as production
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY), "{}", uri);
    }
}

#[tokio::test]
async fn test_cors_preflight_for_configured_origin() {
    let app = TestApp::new();

    let response = app
        .send(
            axum::http::Request::builder()
                .method("OPTIONS")
                .uri("/api/invoices")
                .header(header::ORIGIN, "http://localhost:4200")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:4200"
    );
}

//! Authentication API Tests
//!
//! Everything here is rejected before a database round trip.

use axum::http::StatusCode;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::Fake;
use serde_json::json;

use crate::common::{json_body, token_with, TestApp};

// =============================================================================
// Registration & login validation
// =============================================================================

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let app = TestApp::new();
    let username: String = Username().fake();
    let body = json!({
        "company_name": "Pars Trading",
        "username": username,
        "email": "not-an-email",
        "password": "ValidPassword123!"
    });

    let response = app.post_json("/api/auth/register", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], 10007);
    assert_eq!(json["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_register_with_short_password_fails() {
    let app = TestApp::new();
    let email: String = SafeEmail().fake();
    let body = json!({
        "company_name": "Pars Trading",
        "username": "reza",
        "email": email,
        "password": "short"
    });

    let response = app.post_json("/api/auth/register", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_requires_identifier() {
    let app = TestApp::new();

    let response = app
        .post_json("/api/auth/login", &json!({ "email": "", "password": "whatever1" }))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_missing_fields_is_rejected() {
    let app = TestApp::new();

    let response = app.post_json("/api/auth/login", &json!({})).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_logout_always_succeeds() {
    let app = TestApp::new();

    let response = app
        .post_json("/api/auth/logout", &json!({ "refresh_token": "not-a-real-token" }))
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Bearer tokens
// =============================================================================

#[tokio::test]
async fn test_protected_route_without_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.get("/api/users/me").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], 10003);
}

#[tokio::test]
async fn test_malformed_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.get_auth("/api/customers/individuals", "abc.def.ghi").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_signature_is_unauthorized() {
    let app = TestApp::new();
    let mut token = token_with(&["customers.read"]);
    token.push('x');

    let response = app.get_auth("/api/customers/individuals", &token).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

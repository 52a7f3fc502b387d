//! Permission Tests
//!
//! A valid token without the route's permission gets 403 before any query
//! runs; with the permission, request validation still comes first.

use axum::http::StatusCode;
use serde_json::json;
use test_case::test_case;

use crate::common::{json_body, token_with, TestApp};

#[test_case("/api/users" ; "users")]
#[test_case("/api/roles" ; "roles")]
#[test_case("/api/permissions" ; "permission catalogue")]
#[test_case("/api/company" ; "company profile")]
#[test_case("/api/customers/individuals" ; "individuals")]
#[test_case("/api/customers/companies" ; "companies")]
#[test_case("/api/categories" ; "categories")]
#[test_case("/api/products" ; "products")]
#[test_case("/api/invoices" ; "invoices")]
#[test_case("/api/invoices/1/pdf" ; "invoice pdf")]
#[test_case("/api/chat/conversations" ; "chat")]
#[test_case("/api/referrals" ; "referrals")]
#[tokio::test]
async fn test_route_without_permission_is_forbidden(uri: &str) {
    let app = TestApp::new();
    let token = token_with(&[]);

    let response = app.get_auth(uri, &token).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], 10004);
}

#[tokio::test]
async fn test_read_permission_does_not_allow_writes() {
    let app = TestApp::new();
    let token = token_with(&["invoices.read"]);

    let response = app
        .post_json_auth("/api/invoices/1/status", &json!({ "status": "paid" }), &token)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = TestApp::new();
    let token = token_with(&["invoices.read"]);

    let response = app.get_auth("/api/invoices/not-a-number", &token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_invoice_status_filter_is_rejected() {
    let app = TestApp::new();
    let token = token_with(&["invoices.read"]);

    let response = app.get_auth("/api/invoices?status=archived", &token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_category_body_is_rejected() {
    let app = TestApp::new();
    let token = token_with(&["categories.write"]);

    let response = app
        .post_json_auth("/api/categories", &json!({ "name": "" }), &token)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, create_cors_layer, create_trace_layer, rate_limit_api, rate_limit_auth,
    track_metrics, SecurityHeadersConfig, SecurityHeadersLayer,
};
use crate::startup::AppState;

/// Create the main router with every layer applied
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .nest("/api", api_routes(state.clone()))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        // Stored attachments
        .nest_service(&settings.uploads.public_path, ServeDir::new(&settings.uploads.dir))
        .layer(DefaultBodyLimit::max(settings.server.max_body_size))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_trace_layer())
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(&settings.cors))
        // Outermost, so error responses carry the headers too
        .layer(SecurityHeadersLayer::new(&SecurityHeadersConfig::for_environment(
            &settings.environment,
        )))
        .with_state(state)
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .merge(protected_routes(state))
}

/// Public, with the strict budget
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_auth))
}

/// Everything behind a bearer token. Authentication runs before the limiter
/// so callers are counted per user.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/roles", role_routes())
        .route("/permissions", get(handlers::role::list_permissions))
        .route(
            "/company",
            get(handlers::company::get_company).patch(handlers::company::update_company),
        )
        .nest("/customers", customer_routes())
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/invoices", invoice_routes())
        .nest("/chat", chat_routes())
        .nest("/referrals", referral_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_api))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn user_routes() -> Router<AppState> {
    use handlers::user;

    Router::new()
        .route("/", get(user::list_users).post(user::create_user))
        .route("/me", get(user::get_current_user).patch(user::update_current_user))
        .route("/me/password", post(user::change_password))
        .route(
            "/{user_id}",
            get(user::get_user)
                .patch(user::update_user)
                .delete(user::deactivate_user),
        )
        .route("/{user_id}/roles", put(user::set_user_roles))
}

fn role_routes() -> Router<AppState> {
    use handlers::role;

    Router::new()
        .route("/", get(role::list_roles).post(role::create_role))
        .route(
            "/{role_id}",
            get(role::get_role)
                .patch(role::update_role)
                .delete(role::delete_role),
        )
        .route("/{role_id}/permissions", put(role::set_role_permissions))
}

fn customer_routes() -> Router<AppState> {
    use handlers::customer;

    Router::new()
        .route(
            "/individuals",
            get(customer::list_individuals).post(customer::create_individual),
        )
        .route(
            "/individuals/{customer_id}",
            get(customer::get_individual)
                .put(customer::update_individual)
                .delete(customer::delete_individual),
        )
        .route(
            "/companies",
            get(customer::list_companies).post(customer::create_company),
        )
        .route(
            "/companies/{customer_id}",
            get(customer::get_company)
                .put(customer::update_company)
                .delete(customer::delete_company),
        )
}

fn category_routes() -> Router<AppState> {
    use handlers::catalog;

    Router::new()
        .route("/", get(catalog::list_categories).post(catalog::create_category))
        .route(
            "/{category_id}",
            get(catalog::get_category)
                .patch(catalog::update_category)
                .delete(catalog::delete_category),
        )
}

fn product_routes() -> Router<AppState> {
    use handlers::catalog;

    Router::new()
        .route("/", get(catalog::list_products).post(catalog::create_product))
        .route(
            "/{product_id}",
            get(catalog::get_product)
                .patch(catalog::update_product)
                .delete(catalog::delete_product),
        )
}

fn invoice_routes() -> Router<AppState> {
    use handlers::invoice;

    Router::new()
        .route("/", get(invoice::list_invoices).post(invoice::create_invoice))
        .route(
            "/{invoice_id}",
            get(invoice::get_invoice)
                .put(invoice::update_invoice)
                .delete(invoice::delete_invoice),
        )
        .route("/{invoice_id}/status", post(invoice::change_invoice_status))
        .route("/{invoice_id}/pdf", get(invoice::invoice_pdf))
        .route("/{invoice_id}/print", get(invoice::invoice_print))
        .route("/{invoice_id}/email", post(invoice::email_invoice))
        .route(
            "/{invoice_id}/attachments",
            get(invoice::list_attachments).post(invoice::upload_attachments),
        )
        .route(
            "/{invoice_id}/attachments/{attachment_id}",
            delete(invoice::delete_attachment),
        )
}

fn chat_routes() -> Router<AppState> {
    use handlers::chat;

    Router::new()
        .route(
            "/conversations",
            get(chat::list_conversations).post(chat::create_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/conversations/{conversation_id}/read", post(chat::mark_read))
        .route(
            "/messages/{message_id}",
            patch(chat::edit_message).delete(chat::delete_message),
        )
        .route("/unread", get(chat::unread_count))
}

fn referral_routes() -> Router<AppState> {
    use handlers::referral;

    Router::new()
        .route("/", get(referral::list_referrals).post(referral::create_referral))
        .route("/{referral_id}/respond", post(referral::respond_referral))
}

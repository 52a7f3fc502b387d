//! Authentication Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::application::dto::response::{RegisterResponse, TokenResponse, UserResponse};
use crate::application::services::{AuthService, AuthServiceImpl, Registration};
use crate::domain::{effective_permissions, roles};
use crate::infrastructure::repositories::{
    PgCompanyRepository, PgSessionRepository, PgUserRepository,
};
use crate::presentation::http::extractors::ClientMeta;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn auth_service(state: &AppState) -> impl AuthService {
    AuthServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
        Arc::new(PgCompanyRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.settings.jwt.clone(),
    )
}

/// Register a new tenant and its first administrator
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    validate(&body)?;

    let registration = Registration {
        company_name: body.company_name,
        username: body.username,
        email: body.email,
        password: body.password,
        first_name: body.first_name,
        last_name: body.last_name,
    };
    let (company, user, tokens) = auth_service(&state).register(registration).await?;

    let roles = vec![roles::ADMIN.to_string()];
    let permissions = effective_permissions(&roles, std::iter::empty());
    let response = RegisterResponse {
        company: company.into(),
        user: UserResponse::from_user(user, roles).with_permissions(permissions),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        token_type: tokens.token_type,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email or username
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate(&body)?;

    let tokens = auth_service(&state)
        .login(body.login.trim(), &body.password, client)
        .await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Rotate the refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = auth_service(&state).refresh_token(&body.refresh_token).await?;
    Ok(Json(TokenResponse::from(tokens)))
}

/// Revoke the session behind a refresh token
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> StatusCode {
    if let Err(e) = auth_service(&state).logout(&body.refresh_token).await {
        tracing::warn!(error = %e, "Logout failed");
    }
    StatusCode::NO_CONTENT
}

//! User Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{
    ChangePasswordRequest, CreateUserRequest, SearchQuery, SetRolesRequest, UpdateProfileRequest,
    UpdateUserRequest,
};
use crate::application::dto::response::UserResponse;
use crate::application::services::{UserService, UserServiceImpl, UserView};
use crate::domain::Permission;
use crate::infrastructure::repositories::{PgRoleRepository, PgSessionRepository, PgUserRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn user_service(state: &AppState) -> impl UserService {
    UserServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgRoleRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
        state.mailer.clone(),
        state.snowflake.clone(),
    )
}

fn to_response(view: UserView) -> UserResponse {
    UserResponse::from_user(view.user, view.roles)
}

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let view = user_service(&state).get_me(auth.user_id).await?;
    let permissions = view.permissions.clone();
    Ok(Json(to_response(view).with_permissions(permissions)))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate(&body)?;
    let view = user_service(&state).update_me(auth.user_id, body).await?;
    let permissions = view.permissions.clone();
    Ok(Json(to_response(view).with_permissions(permissions)))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate(&body)?;
    user_service(&state).change_password(auth.user_id, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    auth.require(Permission::UsersRead)?;
    let page = user_service(&state)
        .list(auth.company_id, query.search(), query.page_params())
        .await?;
    Ok(Json(page.map(to_response)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require(Permission::UsersRead)?;
    let id = parse_id(&user_id, "user_id")?;
    let view = user_service(&state).get(auth.company_id, id).await?;
    Ok(Json(to_response(view)))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth.require(Permission::UsersWrite)?;
    validate(&body)?;
    let view = user_service(&state).create(auth.company_id, body).await?;
    Ok((StatusCode::CREATED, Json(to_response(view))))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require(Permission::UsersWrite)?;
    validate(&body)?;
    let id = parse_id(&user_id, "user_id")?;
    let view = user_service(&state)
        .update(auth.company_id, auth.user_id, id, body)
        .await?;
    Ok(Json(to_response(view)))
}

/// Replace the roles of a user
pub async fn set_user_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<SetRolesRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require(Permission::UsersWrite)?;
    auth.require(Permission::RolesWrite)?;
    let id = parse_id(&user_id, "user_id")?;
    let view = user_service(&state)
        .set_roles(auth.company_id, auth.user_id, id, &body.role_ids)
        .await?;
    Ok(Json(to_response(view)))
}

/// Deactivate a user (accounts are never hard-deleted)
pub async fn deactivate_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::UsersWrite)?;
    let id = parse_id(&user_id, "user_id")?;
    user_service(&state)
        .deactivate(auth.company_id, auth.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

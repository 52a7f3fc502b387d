//! Role and permission handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{CreateRoleRequest, SetPermissionsRequest, UpdateRoleRequest};
use crate::application::dto::response::{PermissionResponse, RoleResponse};
use crate::application::services::{RoleService, RoleServiceImpl, RoleView};
use crate::domain::Permission;
use crate::infrastructure::repositories::PgRoleRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn role_service(state: &AppState) -> impl RoleService {
    RoleServiceImpl::new(
        Arc::new(PgRoleRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

fn to_response(view: RoleView) -> RoleResponse {
    RoleResponse::from_role(view.role, view.permissions)
}

pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    auth.require(Permission::RolesRead)?;
    let roles = role_service(&state).list(auth.company_id).await?;
    Ok(Json(roles.into_iter().map(to_response).collect()))
}

pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<String>,
) -> Result<Json<RoleResponse>, AppError> {
    auth.require(Permission::RolesRead)?;
    let id = parse_id(&role_id, "role_id")?;
    Ok(Json(to_response(role_service(&state).get(auth.company_id, id).await?)))
}

pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    auth.require(Permission::RolesWrite)?;
    validate(&body)?;
    let view = role_service(&state).create(auth.company_id, body).await?;
    tracing::info!(role = %view.role.name, by = auth.user_id, "Role created");
    Ok((StatusCode::CREATED, Json(to_response(view))))
}

pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    auth.require(Permission::RolesWrite)?;
    validate(&body)?;
    let id = parse_id(&role_id, "role_id")?;
    Ok(Json(to_response(role_service(&state).update(auth.company_id, id, body).await?)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::RolesWrite)?;
    let id = parse_id(&role_id, "role_id")?;
    role_service(&state).delete(auth.company_id, id).await?;
    tracing::info!(role_id = id, by = auth.user_id, "Role deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the permission grants of a role
pub async fn set_role_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<String>,
    Json(body): Json<SetPermissionsRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    auth.require(Permission::RolesWrite)?;
    let id = parse_id(&role_id, "role_id")?;
    let view = role_service(&state)
        .set_permissions(auth.company_id, id, &body.permissions)
        .await?;
    Ok(Json(to_response(view)))
}

/// The permission catalogue
pub async fn list_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    auth.require(Permission::RolesRead)?;
    let permissions = role_service(&state).permissions().await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

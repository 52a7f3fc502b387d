//! Tenant profile handlers

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::application::dto::request::UpdateCompanyRequest;
use crate::application::dto::response::CompanyResponse;
use crate::application::services::{CompanyService, CompanyServiceImpl};
use crate::domain::Permission;
use crate::infrastructure::repositories::PgCompanyRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn company_service(state: &AppState) -> impl CompanyService {
    CompanyServiceImpl::new(Arc::new(PgCompanyRepository::new(state.db.clone())))
}

pub async fn get_company(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CompanyResponse>, AppError> {
    auth.require(Permission::CompanyRead)?;
    let company = company_service(&state).get(auth.company_id).await?;
    Ok(Json(company.into()))
}

pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateCompanyRequest>,
) -> Result<Json<CompanyResponse>, AppError> {
    auth.require(Permission::CompanyWrite)?;
    validate(&body)?;
    let company = company_service(&state).update(auth.company_id, body).await?;
    Ok(Json(company.into()))
}

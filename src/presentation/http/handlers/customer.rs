//! Customer Handlers
//!
//! Individuals and companies share the same shape: paged list, fetch,
//! create, full replace (contacts included) and delete.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{CompanyCustomerRequest, IndividualRequest, SearchQuery};
use crate::application::dto::response::{CompanyCustomerResponse, IndividualResponse};
use crate::application::services::{CustomerService, CustomerServiceImpl};
use crate::domain::Permission;
use crate::infrastructure::repositories::PgCustomerRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn customer_service(state: &AppState) -> impl CustomerService {
    CustomerServiceImpl::new(
        Arc::new(PgCustomerRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

// =============================================================================
// Individuals
// =============================================================================

pub async fn list_individuals(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<IndividualResponse>>, AppError> {
    auth.require(Permission::CustomersRead)?;
    let page = customer_service(&state)
        .list_individuals(auth.company_id, query.search(), query.page_params())
        .await?;
    Ok(Json(page.map(Into::into)))
}

pub async fn get_individual(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<IndividualResponse>, AppError> {
    auth.require(Permission::CustomersRead)?;
    let id = parse_id(&id, "id")?;
    let customer = customer_service(&state).get_individual(auth.company_id, id).await?;
    Ok(Json(customer.into()))
}

pub async fn create_individual(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<IndividualRequest>,
) -> Result<(StatusCode, Json<IndividualResponse>), AppError> {
    auth.require(Permission::CustomersWrite)?;
    validate(&body)?;
    let customer = customer_service(&state)
        .create_individual(auth.company_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

pub async fn update_individual(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<IndividualRequest>,
) -> Result<Json<IndividualResponse>, AppError> {
    auth.require(Permission::CustomersWrite)?;
    validate(&body)?;
    let id = parse_id(&id, "id")?;
    let customer = customer_service(&state)
        .update_individual(auth.company_id, id, body)
        .await?;
    Ok(Json(customer.into()))
}

pub async fn delete_individual(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::CustomersDelete)?;
    let id = parse_id(&id, "id")?;
    customer_service(&state).delete_individual(auth.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Companies
// =============================================================================

pub async fn list_companies(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<CompanyCustomerResponse>>, AppError> {
    auth.require(Permission::CustomersRead)?;
    let page = customer_service(&state)
        .list_companies(auth.company_id, query.search(), query.page_params())
        .await?;
    Ok(Json(page.map(Into::into)))
}

pub async fn get_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CompanyCustomerResponse>, AppError> {
    auth.require(Permission::CustomersRead)?;
    let id = parse_id(&id, "id")?;
    let customer = customer_service(&state).get_company(auth.company_id, id).await?;
    Ok(Json(customer.into()))
}

pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CompanyCustomerRequest>,
) -> Result<(StatusCode, Json<CompanyCustomerResponse>), AppError> {
    auth.require(Permission::CustomersWrite)?;
    validate(&body)?;
    let customer = customer_service(&state)
        .create_company(auth.company_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CompanyCustomerRequest>,
) -> Result<Json<CompanyCustomerResponse>, AppError> {
    auth.require(Permission::CustomersWrite)?;
    validate(&body)?;
    let id = parse_id(&id, "id")?;
    let customer = customer_service(&state)
        .update_company(auth.company_id, id, body)
        .await?;
    Ok(Json(customer.into()))
}

pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::CustomersDelete)?;
    let id = parse_id(&id, "id")?;
    customer_service(&state).delete_company(auth.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Category and product handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{
    CreateCategoryRequest, CreateProductRequest, ProductQuery, UpdateCategoryRequest,
    UpdateProductRequest,
};
use crate::application::dto::response::{CategoryResponse, ProductResponse};
use crate::application::services::{CatalogService, CatalogServiceImpl};
use crate::domain::{Permission, ProductFilter};
use crate::infrastructure::repositories::{PgCategoryRepository, PgProductRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn catalog_service(state: &AppState) -> impl CatalogService {
    CatalogServiceImpl::new(
        Arc::new(PgCategoryRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

// =============================================================================
// Categories
// =============================================================================

pub async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    auth.require(Permission::CategoriesRead)?;
    let categories = catalog_service(&state).list_categories(auth.company_id).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

pub async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse>, AppError> {
    auth.require(Permission::CategoriesRead)?;
    let id = parse_id(&id, "id")?;
    let category = catalog_service(&state).get_category(auth.company_id, id).await?;
    Ok(Json(category.into()))
}

pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    auth.require(Permission::CategoriesWrite)?;
    validate(&body)?;
    let category = catalog_service(&state)
        .create_category(auth.company_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    auth.require(Permission::CategoriesWrite)?;
    validate(&body)?;
    let id = parse_id(&id, "id")?;
    let category = catalog_service(&state)
        .update_category(auth.company_id, id, body)
        .await?;
    Ok(Json(category.into()))
}

pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::CategoriesWrite)?;
    let id = parse_id(&id, "id")?;
    catalog_service(&state).delete_category(auth.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

pub async fn list_products(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<ProductResponse>>, AppError> {
    auth.require(Permission::ProductsRead)?;
    let filter = ProductFilter {
        search: query.search(),
        category_id: query
            .category_id
            .as_deref()
            .map(|id| parse_id(id, "category_id"))
            .transpose()?,
        active: query.active,
    };
    let page = catalog_service(&state)
        .list_products(auth.company_id, filter, query.page_params())
        .await?;
    Ok(Json(page.map(Into::into)))
}

pub async fn get_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    auth.require(Permission::ProductsRead)?;
    let id = parse_id(&id, "id")?;
    let product = catalog_service(&state).get_product(auth.company_id, id).await?;
    Ok(Json(product.into()))
}

pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    auth.require(Permission::ProductsWrite)?;
    validate(&body)?;
    let product = catalog_service(&state)
        .create_product(auth.company_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    auth.require(Permission::ProductsWrite)?;
    validate(&body)?;
    let id = parse_id(&id, "id")?;
    let product = catalog_service(&state)
        .update_product(auth.company_id, id, body)
        .await?;
    Ok(Json(product.into()))
}

pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ProductsWrite)?;
    let id = parse_id(&id, "id")?;
    catalog_service(&state).delete_product(auth.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Product catalog: categories and products.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

/// A product category, optionally nested under a parent.
///
/// Maps to `categories`; `(company_id, name)` is unique and `parent_id`
/// restricts deletion of the parent.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable product.
///
/// Maps to `products`; `(company_id, sku)` is unique. Prices are whole Rials.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price: i64,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub active: Option<bool>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories of a tenant ordered by name.
    async fn list(&self, company_id: i64) -> Result<Vec<Category>, AppError>;

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Category>, AppError>;

    async fn create(&self, category: &Category) -> Result<Category, AppError>;

    async fn update(&self, category: &Category) -> Result<Category, AppError>;

    /// Fails with `Conflict` while products or child categories reference it.
    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    /// Ids of the category and all its ancestors, nearest first.
    async fn ancestor_ids(&self, company_id: i64, id: i64) -> Result<Vec<i64>, AppError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(
        &self,
        company_id: i64,
        filter: ProductFilter,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), AppError>;

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Product>, AppError>;

    /// Products of the tenant matching the given ids; unknown ids are skipped.
    async fn find_by_ids(&self, company_id: i64, ids: &[i64]) -> Result<Vec<Product>, AppError>;

    async fn create(&self, product: &Product) -> Result<Product, AppError>;

    async fn update(&self, product: &Product) -> Result<Product, AppError>;

    /// Fails with `Conflict` while invoice items reference it.
    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError>;
}

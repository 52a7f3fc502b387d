//! Catalog Service
//!
//! Product categories (a tree per tenant) and products.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::parse_id;
use crate::application::dto::request::{
    CreateCategoryRequest, CreateProductRequest, UpdateCategoryRequest, UpdateProductRequest,
};
use crate::domain::{Category, CategoryRepository, Product, ProductFilter, ProductRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::snowflake::SnowflakeGenerator;

const DEFAULT_UNIT: &str = "pcs";

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_categories(&self, company_id: i64) -> Result<Vec<Category>, AppError>;

    async fn get_category(&self, company_id: i64, id: i64) -> Result<Category, AppError>;

    async fn create_category(
        &self,
        company_id: i64,
        request: CreateCategoryRequest,
    ) -> Result<Category, AppError>;

    /// Re-parenting is rejected when it would create a cycle.
    async fn update_category(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateCategoryRequest,
    ) -> Result<Category, AppError>;

    async fn delete_category(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    async fn list_products(
        &self,
        company_id: i64,
        filter: ProductFilter,
        page: PageParams,
    ) -> Result<Page<Product>, AppError>;

    async fn get_product(&self, company_id: i64, id: i64) -> Result<Product, AppError>;

    async fn create_product(
        &self,
        company_id: i64,
        request: CreateProductRequest,
    ) -> Result<Product, AppError>;

    async fn update_product(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateProductRequest,
    ) -> Result<Product, AppError>;

    async fn delete_product(&self, company_id: i64, id: i64) -> Result<(), AppError>;
}

pub struct CatalogServiceImpl<C, P>
where
    C: CategoryRepository,
    P: ProductRepository,
{
    category_repo: Arc<C>,
    product_repo: Arc<P>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<C, P> CatalogServiceImpl<C, P>
where
    C: CategoryRepository,
    P: ProductRepository,
{
    pub fn new(category_repo: Arc<C>, product_repo: Arc<P>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            category_repo,
            product_repo,
            id_generator,
        }
    }

    /// Parse and check a category reference from a request body.
    async fn existing_category(&self, company_id: i64, raw: &str, field: &str) -> Result<i64, AppError> {
        let id = parse_id(raw, field)?;
        if self.category_repo.find_by_id(company_id, id).await?.is_none() {
            return Err(AppError::validation(format!("{}: category {} does not exist", field, id)));
        }
        Ok(id)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<C, P> CatalogService for CatalogServiceImpl<C, P>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    async fn list_categories(&self, company_id: i64) -> Result<Vec<Category>, AppError> {
        self.category_repo.list(company_id).await
    }

    async fn get_category(&self, company_id: i64, id: i64) -> Result<Category, AppError> {
        self.category_repo
            .find_by_id(company_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    async fn create_category(
        &self,
        company_id: i64,
        request: CreateCategoryRequest,
    ) -> Result<Category, AppError> {
        let parent_id = match request.parent_id.as_deref() {
            Some(raw) => Some(self.existing_category(company_id, raw, "parent_id").await?),
            None => None,
        };

        let now = Utc::now();
        let category = Category {
            id: self.id_generator.generate(),
            company_id,
            name: request.name.trim().to_string(),
            description: clean(request.description),
            parent_id,
            created_at: now,
            updated_at: now,
        };
        self.category_repo.create(&category).await
    }

    async fn update_category(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateCategoryRequest,
    ) -> Result<Category, AppError> {
        let mut category = self.get_category(company_id, id).await?;

        if let Some(name) = update.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            category.description = clean(description);
        }
        if let Some(parent) = update.parent_id {
            category.parent_id = match parent.as_deref() {
                None => None,
                Some(raw) => {
                    let parent_id = self.existing_category(company_id, raw, "parent_id").await?;
                    // the new parent must not be the category itself or one of its descendants
                    let ancestors = self.category_repo.ancestor_ids(company_id, parent_id).await?;
                    if ancestors.contains(&id) {
                        return Err(AppError::validation(
                            "parent_id: a category cannot be placed under itself or its descendants",
                        ));
                    }
                    Some(parent_id)
                }
            };
        }

        self.category_repo.update(&category).await
    }

    async fn delete_category(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        self.get_category(company_id, id).await?;
        self.category_repo.delete(company_id, id).await
    }

    async fn list_products(
        &self,
        company_id: i64,
        filter: ProductFilter,
        page: PageParams,
    ) -> Result<Page<Product>, AppError> {
        let (items, total) = self.product_repo.list(company_id, filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    async fn get_product(&self, company_id: i64, id: i64) -> Result<Product, AppError> {
        self.product_repo
            .find_by_id(company_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product with id {} not found", id)))
    }

    async fn create_product(
        &self,
        company_id: i64,
        request: CreateProductRequest,
    ) -> Result<Product, AppError> {
        let category_id = match request.category_id.as_deref() {
            Some(raw) => Some(self.existing_category(company_id, raw, "category_id").await?),
            None => None,
        };

        let now = Utc::now();
        let product = Product {
            id: self.id_generator.generate(),
            company_id,
            category_id,
            name: request.name.trim().to_string(),
            sku: request.sku.trim().to_string(),
            description: clean(request.description),
            unit: clean(request.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            unit_price: request.unit_price,
            stock_quantity: request.stock_quantity.unwrap_or(0),
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let product = self.product_repo.create(&product).await?;
        tracing::info!(company_id, product_id = product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    async fn update_product(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateProductRequest,
    ) -> Result<Product, AppError> {
        let mut product = self.get_product(company_id, id).await?;

        if let Some(category) = update.category_id {
            product.category_id = match category.as_deref() {
                Some(raw) => Some(self.existing_category(company_id, raw, "category_id").await?),
                None => None,
            };
        }
        if let Some(name) = update.name {
            product.name = name.trim().to_string();
        }
        if let Some(sku) = update.sku {
            product.sku = sku.trim().to_string();
        }
        if let Some(description) = update.description {
            product.description = clean(description);
        }
        if let Some(unit) = clean(update.unit) {
            product.unit = unit;
        }
        if let Some(unit_price) = update.unit_price {
            product.unit_price = unit_price;
        }
        if let Some(stock) = update.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(is_active) = update.is_active {
            product.is_active = is_active;
        }

        self.product_repo.update(&product).await
    }

    async fn delete_product(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        self.get_product(company_id, id).await?;
        self.product_repo.delete(company_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockCategoryRepository, MockProductRepository};
    use mockall::predicate::*;

    fn create_test_category(id: i64, parent_id: Option<i64>) -> Category {
        let now = Utc::now();
        Category {
            id,
            company_id: 1,
            name: format!("Category {}", id),
            description: None,
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_service(
        categories: MockCategoryRepository,
        products: MockProductRepository,
    ) -> CatalogServiceImpl<MockCategoryRepository, MockProductRepository> {
        CatalogServiceImpl::new(
            Arc::new(categories),
            Arc::new(products),
            Arc::new(SnowflakeGenerator::new(1, 0)),
        )
    }

    // ==================== Categories ====================

    #[tokio::test]
    async fn test_reparent_under_descendant_is_rejected() {
        // 1 <- 2 <- 3; moving 1 under 3 would form a cycle
        let mut categories = MockCategoryRepository::new();
        categories
            .expect_find_by_id()
            .returning(|_, id| Ok(Some(create_test_category(id, None))));
        categories
            .expect_ancestor_ids()
            .with(eq(1), eq(3))
            .returning(|_, _| Ok(vec![3, 2, 1]));
        categories.expect_update().never();

        let result = create_service(categories, MockProductRepository::new())
            .update_category(
                1,
                1,
                UpdateCategoryRequest {
                    name: None,
                    description: None,
                    parent_id: Some(Some("3".into())),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_category_cannot_be_its_own_parent() {
        let mut categories = MockCategoryRepository::new();
        categories
            .expect_find_by_id()
            .returning(|_, id| Ok(Some(create_test_category(id, None))));
        categories
            .expect_ancestor_ids()
            .returning(|_, id| Ok(vec![id]));

        let result = create_service(categories, MockProductRepository::new())
            .update_category(
                1,
                4,
                UpdateCategoryRequest {
                    name: None,
                    description: None,
                    parent_id: Some(Some("4".into())),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_clearing_parent_skips_cycle_check() {
        let mut categories = MockCategoryRepository::new();
        categories
            .expect_find_by_id()
            .returning(|_, id| Ok(Some(create_test_category(id, Some(9)))));
        categories.expect_ancestor_ids().never();
        categories
            .expect_update()
            .withf(|c| c.parent_id.is_none())
            .returning(|c| Ok(c.clone()));

        let category = create_service(categories, MockProductRepository::new())
            .update_category(
                1,
                4,
                UpdateCategoryRequest {
                    name: None,
                    description: None,
                    parent_id: Some(None),
                },
            )
            .await
            .unwrap();

        assert_eq!(category.parent_id, None);
    }

    // ==================== Products ====================

    #[tokio::test]
    async fn test_create_product_with_unknown_category() {
        let mut categories = MockCategoryRepository::new();
        categories.expect_find_by_id().returning(|_, _| Ok(None));
        let mut products = MockProductRepository::new();
        products.expect_create().never();

        let result = create_service(categories, products)
            .create_product(
                1,
                CreateProductRequest {
                    category_id: Some("77".into()),
                    name: "Desk".into(),
                    sku: "DSK-1".into(),
                    description: None,
                    unit: None,
                    unit_price: 1_500_000,
                    stock_quantity: None,
                    is_active: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_product_defaults() {
        let mut products = MockProductRepository::new();
        products.expect_create().returning(|p| Ok(p.clone()));

        let product = create_service(MockCategoryRepository::new(), products)
            .create_product(
                1,
                CreateProductRequest {
                    category_id: None,
                    name: " Desk ".into(),
                    sku: "DSK-1".into(),
                    description: None,
                    unit: None,
                    unit_price: 1_500_000,
                    stock_quantity: None,
                    is_active: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(product.name, "Desk");
        assert_eq!(product.unit, "pcs");
        assert_eq!(product.stock_quantity, 0);
        assert!(product.is_active);
    }
}

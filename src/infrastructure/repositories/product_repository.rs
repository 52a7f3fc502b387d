//! Product Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Product, ProductFilter, ProductRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{like_pattern, PageParams};

const PRODUCT_COLUMNS: &str = "id, company_id, category_id, name, sku, description, unit, \
                               unit_price, stock_quantity, is_active, created_at, updated_at";

const PRODUCT_FILTER: &str = r#"
    company_id = $1
    AND ($2::TEXT IS NULL OR name ILIKE $2 OR sku ILIKE $2)
    AND ($3::BIGINT IS NULL OR category_id = $3)
    AND ($4::BOOLEAN IS NULL OR is_active = $4)
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    company_id: i64,
    category_id: Option<i64>,
    name: String,
    sku: String,
    description: Option<String>,
    unit: String,
    unit_price: i64,
    stock_quantity: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id,
            company_id: self.company_id,
            category_id: self.category_id,
            name: self.name,
            sku: self.sku,
            description: self.description,
            unit: self.unit,
            unit_price: self.unit_price,
            stock_quantity: self.stock_quantity,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL product repository implementation.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(
        &self,
        company_id: i64,
        filter: ProductFilter,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let pattern = filter.search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {PRODUCT_FILTER} \
             ORDER BY name, id LIMIT $5 OFFSET $6"
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(filter.category_id)
        .bind(filter.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER}"
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(filter.category_id)
        .bind(filter.active)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| r.into_product()).collect(), total))
    }

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_product()))
    }

    async fn find_by_ids(&self, company_id: i64, ids: &[i64]) -> Result<Vec<Product>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE company_id = $1 AND id = ANY($2)"
        ))
        .bind(company_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_product()).collect())
    }

    async fn create(&self, product: &Product) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (id, company_id, category_id, name, sku, description, unit,
                                  unit_price, stock_quantity, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(product.company_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.unit_price)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A product with this SKU already exists"))?;

        Ok(row.into_product())
    }

    async fn update(&self, product: &Product) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET category_id = $3, name = $4, sku = $5, description = $6, unit = $7,
                unit_price = $8, stock_quantity = $9, is_active = $10, updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.company_id)
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.unit_price)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A product with this SKU already exists"))?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        Ok(row.into_product())
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM products WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::from_foreign_key_violation(e, "Product is used on invoices and cannot be deleted")
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product not found".into()));
        }
        Ok(())
    }
}

//! Category Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Category, CategoryRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    company_id: i64,
    name: String,
    description: Option<String>,
    parent_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CategoryRow {
    fn into_category(self) -> Category {
        Category {
            id: self.id,
            company_id: self.company_id,
            name: self.name,
            description: self.description,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL category repository implementation.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: PgPool,
}

impl PgCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn list(&self, company_id: i64) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, company_id, name, description, parent_id, created_at, updated_at
            FROM categories
            WHERE company_id = $1
            ORDER BY name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_category()).collect())
    }

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Category>, AppError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, company_id, name, description, parent_id, created_at, updated_at
            FROM categories
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_category()))
    }

    async fn create(&self, category: &Category) -> Result<Category, AppError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (id, company_id, name, description, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, name, description, parent_id, created_at, updated_at
            "#,
        )
        .bind(category.id)
        .bind(category.company_id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A category with this name already exists"))?;

        Ok(row.into_category())
    }

    async fn update(&self, category: &Category) -> Result<Category, AppError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET name = $3, description = $4, parent_id = $5, updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, name, description, parent_id, created_at, updated_at
            "#,
        )
        .bind(category.company_id)
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.parent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A category with this name already exists"))?
        .ok_or_else(|| AppError::NotFound("Category not found".into()))?;

        Ok(row.into_category())
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::from_foreign_key_violation(
                    e,
                    "Category still has products or subcategories",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category not found".into()));
        }
        Ok(())
    }

    async fn ancestor_ids(&self, company_id: i64, id: i64) -> Result<Vec<i64>, AppError> {
        // Depth cap guards against cycles already present in the table.
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            WITH RECURSIVE chain (id, parent_id, depth) AS (
                SELECT id, parent_id, 0
                FROM categories
                WHERE company_id = $1 AND id = $2
                UNION ALL
                SELECT c.id, c.parent_id, chain.depth + 1
                FROM categories c
                JOIN chain ON c.id = chain.parent_id
                WHERE c.company_id = $1 AND chain.depth < 64
            )
            SELECT id FROM chain ORDER BY depth
            "#,
        )
        .bind(company_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

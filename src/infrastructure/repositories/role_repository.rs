//! Role Repository Implementation
//!
//! Tenant-owned roles, the shared permission catalogue and role-permission
//! grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{PermissionRecord, Role, RoleRepository};
use crate::shared::error::AppError;

const ROLE_COLUMNS: &str = "id, company_id, name, description, created_at, updated_at";
const NAME_TAKEN: &str = "A role with this name already exists";

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i64,
    company_id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self) -> Role {
        Role {
            id: self.id,
            company_id: self.company_id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PermissionRow {
    name: String,
    description: Option<String>,
}

/// PostgreSQL role repository implementation.
#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a role and its grants inside an open transaction.
pub(crate) async fn insert_role(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    role: &Role,
    permissions: &[String],
) -> Result<Role, AppError> {
    let row = sqlx::query_as::<_, RoleRow>(&format!(
        r#"
        INSERT INTO roles (id, company_id, name, description)
        VALUES ($1, $2, $3, $4)
        RETURNING {ROLE_COLUMNS}
        "#
    ))
    .bind(role.id)
    .bind(role.company_id)
    .bind(&role.name)
    .bind(&role.description)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::from_unique_violation(e, NAME_TAKEN))?;

    if !permissions.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_name)
            SELECT $1, UNNEST($2::VARCHAR[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(permissions)
        .execute(&mut **tx)
        .await?;
    }

    Ok(row.into_role())
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn list(&self, company_id: i64) -> Result<Vec<Role>, AppError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE company_id = $1 ORDER BY name"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_role()).collect())
    }

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Role>, AppError> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND company_id = $2"
        ))
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_role()))
    }

    async fn find_by_name(&self, company_id: i64, name: &str) -> Result<Option<Role>, AppError> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE company_id = $1 AND name = $2"
        ))
        .bind(company_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_role()))
    }

    async fn find_by_ids(&self, company_id: i64, ids: &[i64]) -> Result<Vec<Role>, AppError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM roles
            WHERE company_id = $1 AND id = ANY($2)
            ORDER BY name
            "#
        ))
        .bind(company_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_role()).collect())
    }

    async fn create(&self, role: &Role, permissions: &[String]) -> Result<Role, AppError> {
        let mut tx = self.pool.begin().await?;
        let created = insert_role(&mut tx, role, permissions).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, role: &Role) -> Result<Role, AppError> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            UPDATE roles
            SET name = $3, description = $4, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role.id)
        .bind(role.company_id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, NAME_TAKEN))?
        .ok_or_else(|| AppError::NotFound(format!("Role with id {} not found", role.id)))?;

        Ok(row.into_role())
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND company_id = $2")
            .bind(id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Role with id {} not found", id)));
        }
        Ok(())
    }

    async fn permissions_of(&self, role_id: i64) -> Result<Vec<String>, AppError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT permission_name FROM role_permissions WHERE role_id = $1 ORDER BY permission_name",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn set_permissions(&self, role_id: i64, permissions: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_name)
            SELECT $1, UNNEST($2::VARCHAR[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permissions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, AppError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT name, description FROM permissions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PermissionRecord {
                name: r.name,
                description: r.description,
            })
            .collect())
    }

    async fn seed_permissions(&self, permissions: &[PermissionRecord]) -> Result<(), AppError> {
        let names: Vec<&str> = permissions.iter().map(|p| p.name.as_str()).collect();
        let descriptions: Vec<Option<&str>> =
            permissions.iter().map(|p| p.description.as_deref()).collect();

        sqlx::query(
            r#"
            INSERT INTO permissions (name, description)
            SELECT * FROM UNNEST($1::VARCHAR[], $2::TEXT[])
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&names)
        .bind(&descriptions)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the database schema and domain User entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{User, UserRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{like_pattern, PageParams};

const USER_COLUMNS: &str = "id, company_id, username, email, password_hash, first_name, last_name, \
                            phone, is_active, last_login_at, created_at, updated_at";

/// Database row representation matching the users table schema.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    company_id: i64,
    username: String,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Convert database row to domain User entity.
    fn into_user(self) -> User {
        User {
            id: self.id,
            company_id: self.company_id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a user and its role assignments inside an open transaction.
pub(crate) async fn insert_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user: &User,
    role_ids: &[i64],
) -> Result<User, AppError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (id, company_id, username, email, password_hash, first_name,
                           last_name, phone, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(user.company_id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.is_active)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        AppError::from_unique_violation(e, "User with this email or username already exists")
    })?;

    if !role_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(role_ids)
        .execute(&mut **tx)
        .await?;
    }

    Ok(row.into_user())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE LOWER(email) = LOWER($1) OR LOWER(username) = LOWER($1)
            LIMIT 1
            "#
        ))
        .bind(login.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn list(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<User>, i64), AppError> {
        let pattern = search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR username ILIKE $2 OR email ILIKE $2
                   OR first_name ILIKE $2 OR last_name ILIKE $2)
            ORDER BY username
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(company_id)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR username ILIKE $2 OR email ILIKE $2
                   OR first_name ILIKE $2 OR last_name ILIKE $2)
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| r.into_user()).collect(), total))
    }

    async fn create(&self, user: &User, role_ids: &[i64]) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let created = insert_user(&mut tx, user, role_ids).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET email = $2,
                first_name = $3,
                last_name = $4,
                phone = $5,
                is_active = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email is already registered"))?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user.id)))?;

        Ok(row.into_user())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    async fn set_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn role_names(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn permission_names(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT rp.permission_name
            FROM user_roles ur
            JOIN role_permissions rp ON rp.role_id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY rp.permission_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn active_ids_in_company(&self, company_id: i64, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE company_id = $1 AND is_active AND id = ANY($2)",
        )
        .bind(company_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(found)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

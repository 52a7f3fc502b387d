//! Session Repository Implementation
//!
//! PostgreSQL implementation of the SessionRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Session, SessionRepository};
use crate::shared::error::AppError;

/// Database row representation matching the user_sessions table schema.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: i64,
    refresh_token_hash: String,
    user_agent: Option<String>,
    ip_address: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            refresh_token_hash: self.refresh_token_hash,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
            expires_at: self.expires_at,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            revoked_at: self.revoked_at,
        }
    }
}

/// PostgreSQL session repository implementation.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO user_sessions (id, user_id, refresh_token_hash, user_agent, ip_address,
                                       expires_at, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, refresh_token_hash, user_agent, ip_address,
                      expires_at, created_at, last_used_at, revoked_at
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_used_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_session())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, refresh_token_hash, user_agent, ip_address,
                   expires_at, created_at, last_used_at, revoked_at
            FROM user_sessions
            WHERE refresh_token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_session()))
    }

    async fn update_token_hash(
        &self,
        id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $2, expires_at = $3, last_used_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(new_token_hash)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Session not found".into()));
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE user_sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

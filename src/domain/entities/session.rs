//! Refresh-token session entity and repository trait.
//!
//! Maps to the `user_sessions` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::shared::error::AppError;

/// A login session backing one refresh token.
///
/// Maps to the `user_sessions` table:
/// - id: UUID PRIMARY KEY
/// - user_id: BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE
/// - refresh_token_hash: VARCHAR(64) NOT NULL UNIQUE (SHA-256 hex)
/// - user_agent: TEXT NULL
/// - ip_address: VARCHAR(45) NULL
/// - expires_at: TIMESTAMPTZ NOT NULL
/// - created_at / last_used_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - revoked_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,

    /// SHA-256 hash of the refresh token (raw tokens are never stored)
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,

    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new session.
    pub fn new(user_id: i64, refresh_token_hash: String, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            refresh_token_hash,
            user_agent: None,
            ip_address: None,
            expires_at,
            created_at: now,
            last_used_at: now,
            revoked_at: None,
        }
    }

    /// Not expired and not revoked.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Repository trait for refresh-token sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session.
    async fn create(&self, session: &Session) -> Result<Session, AppError>;

    /// Find a session by the hash of its refresh token.
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError>;

    /// Rotate the refresh token of a session.
    async fn update_token_hash(
        &self,
        id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Revoke a single session.
    async fn revoke(&self, id: Uuid) -> Result<(), AppError>;

    /// Revoke every session of a user (password change, deactivation).
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError>;
}

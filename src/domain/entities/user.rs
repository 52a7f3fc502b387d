//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

/// An employee account of one tenant.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - company_id: BIGINT NOT NULL REFERENCES main_companies(id)
/// - username: VARCHAR(32) NOT NULL UNIQUE
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - password_hash: VARCHAR(255) NOT NULL
/// - first_name / last_name: VARCHAR(100) NULL
/// - phone: VARCHAR(20) NULL
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - last_login_at: TIMESTAMPTZ NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Tenant this user belongs to
    pub company_id: i64,

    /// Username (3-32 characters, unique)
    pub username: String,

    /// Email address (unique)
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,

    /// Inactive users cannot log in or refresh tokens
    pub is_active: bool,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", falling back to the username when no name is set.
    pub fn full_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            company_id: 0,
            username: String::new(),
            email: String::new(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for User data access operations.
///
/// Lookups by id are global; callers compare `company_id` against the
/// caller's tenant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by email or username (case-insensitive).
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError>;

    /// Page through the users of a tenant, optionally filtered by name, username or email.
    async fn list(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<User>, i64), AppError>;

    /// Create a user and assign roles in one transaction.
    async fn create(&self, user: &User, role_ids: &[i64]) -> Result<User, AppError>;

    /// Update profile fields and the active flag.
    async fn update(&self, user: &User) -> Result<User, AppError>;

    /// Replace the stored password hash.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError>;

    /// Replace the role assignments of a user in one transaction.
    async fn set_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), AppError>;

    /// Names of the roles assigned to a user.
    async fn role_names(&self, user_id: i64) -> Result<Vec<String>, AppError>;

    /// Names of every permission granted through the user's roles.
    async fn permission_names(&self, user_id: i64) -> Result<Vec<String>, AppError>;

    /// Record a successful login.
    async fn touch_last_login(&self, id: i64) -> Result<(), AppError>;

    /// Check if an email address is already registered.
    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;

    /// Check if a username is already taken.
    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;

    /// Of the given ids, those that are active users of the tenant.
    async fn active_ids_in_company(&self, company_id: i64, ids: &[i64]) -> Result<Vec<i64>, AppError>;

    /// Total number of users across all tenants.
    async fn count(&self) -> Result<i64, AppError>;
}

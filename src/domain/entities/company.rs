//! Tenant (main company) entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::role::RoleSeed;
use super::user::User;
use crate::shared::error::AppError;

/// The business that owns a CRM tenant. Printed as the seller on invoices.
///
/// Maps to the `main_companies` table. Every tenant-owned row carries a
/// `company_id` referencing it.
#[derive(Debug, Clone, Serialize)]
pub struct MainCompany {
    pub id: i64,
    pub name: String,
    /// Economic code (کد اقتصادی)
    pub economic_code: Option<String>,
    /// Legal-entity national id (شناسه ملی), 11 digits
    pub national_id: Option<String>,
    pub registration_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MainCompany {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            economic_code: None,
            national_id: None,
            registration_number: None,
            phone: None,
            address: None,
            postal_code: None,
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<MainCompany>, AppError>;

    /// Update the tenant profile.
    async fn update(&self, company: &MainCompany) -> Result<MainCompany, AppError>;

    /// Create a tenant with its roles and its first user, in one
    /// transaction. The owner is assigned the seeded role named `owner_role`.
    async fn create_with_owner(
        &self,
        company: &MainCompany,
        owner: &User,
        roles: &[RoleSeed],
        owner_role: &str,
    ) -> Result<(MainCompany, User), AppError>;
}

//! Role entity and repository trait.
//!
//! Roles are named bundles of permissions owned by a single tenant. Each
//! tenant receives its own copies of the built-in roles when it is created.
//! Users receive roles through `user_roles`; roles receive permissions
//! through `role_permissions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::{roles, Permission};
use crate::shared::error::AppError;

/// A named role.
///
/// Maps to the `roles` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - company_id: BIGINT NOT NULL REFERENCES main_companies(id)
/// - name: VARCHAR(64) NOT NULL, UNIQUE per company
/// - description: TEXT NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(
        id: i64,
        company_id: i64,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            company_id,
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `Admin` role cannot be renamed or deleted.
    pub fn is_admin(&self) -> bool {
        self.name == roles::ADMIN
    }
}

/// A role together with the permissions it starts with.
#[derive(Debug, Clone)]
pub struct RoleSeed {
    pub role: Role,
    pub permissions: Vec<String>,
}

impl RoleSeed {
    /// The built-in roles for a new tenant. `next_id` supplies role ids.
    pub fn builtin(company_id: i64, mut next_id: impl FnMut() -> i64) -> Vec<RoleSeed> {
        let builtin: [(&str, &str, &[Permission]); 3] = [
            (roles::ADMIN, "Full access to the tenant", &Permission::ALL),
            (roles::MANAGER, "Manages customers, catalog and invoices", roles::MANAGER_PERMISSIONS),
            (roles::SALES, "Works with customers and invoices", roles::SALES_PERMISSIONS),
        ];

        builtin
            .into_iter()
            .map(|(name, description, grants)| RoleSeed {
                role: Role::new(next_id(), company_id, name, Some(description.to_string())),
                permissions: grants.iter().map(|p| p.as_str().to_string()).collect(),
            })
            .collect()
    }
}

/// A row of the `permissions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRecord {
    pub name: String,
    pub description: Option<String>,
}

/// Repository trait for roles and their permission grants.
///
/// Every role lookup is scoped to a tenant; a role of another tenant is
/// reported as absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// The tenant's roles ordered by name.
    async fn list(&self, company_id: i64) -> Result<Vec<Role>, AppError>;

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Role>, AppError>;

    async fn find_by_name(&self, company_id: i64, name: &str) -> Result<Option<Role>, AppError>;

    /// The tenant's roles matching the given ids; unknown ids are skipped.
    async fn find_by_ids(&self, company_id: i64, ids: &[i64]) -> Result<Vec<Role>, AppError>;

    /// Insert a role and its grants in one transaction.
    async fn create(&self, role: &Role, permissions: &[String]) -> Result<Role, AppError>;

    /// Update name and description of a role owned by `role.company_id`.
    async fn update(&self, role: &Role) -> Result<Role, AppError>;

    /// Delete a tenant's role; assignments and grants cascade.
    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    /// Permission names granted to a role, sorted.
    async fn permissions_of(&self, role_id: i64) -> Result<Vec<String>, AppError>;

    /// Replace the permission grants of a role in one transaction.
    async fn set_permissions(&self, role_id: i64, permissions: &[String]) -> Result<(), AppError>;

    /// The permission catalogue as stored.
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, AppError>;

    /// Insert missing permissions. Existing rows are left untouched.
    async fn seed_permissions(&self, permissions: &[PermissionRecord]) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_detection() {
        assert!(Role::new(1, 1, "Admin", None).is_admin());
        assert!(!Role::new(2, 1, "admin", None).is_admin());
        assert!(!Role::new(3, 1, "Sales", None).is_admin());
    }

    #[test]
    fn test_builtin_seeds_belong_to_tenant() {
        let mut next = 100;
        let seeds = RoleSeed::builtin(42, || {
            next += 1;
            next
        });

        let names: Vec<&str> = seeds.iter().map(|s| s.role.name.as_str()).collect();
        assert_eq!(names, vec!["Admin", "Manager", "Sales"]);
        assert!(seeds.iter().all(|s| s.role.company_id == 42));
        assert_eq!(seeds[0].permissions.len(), Permission::ALL.len());
        assert_eq!(seeds[2].role.id, 103);
    }
}

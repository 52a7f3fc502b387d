//! CRM permission catalogue.
//!
//! Permissions are stored by name in the `permissions` table and granted to
//! roles through `role_permissions`. Access tokens carry the union of a
//! user's role permissions as a list of names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single named capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "users.read")]
    UsersRead,
    #[serde(rename = "users.write")]
    UsersWrite,
    #[serde(rename = "roles.read")]
    RolesRead,
    #[serde(rename = "roles.write")]
    RolesWrite,
    #[serde(rename = "company.read")]
    CompanyRead,
    #[serde(rename = "company.write")]
    CompanyWrite,
    #[serde(rename = "customers.read")]
    CustomersRead,
    #[serde(rename = "customers.write")]
    CustomersWrite,
    #[serde(rename = "customers.delete")]
    CustomersDelete,
    #[serde(rename = "categories.read")]
    CategoriesRead,
    #[serde(rename = "categories.write")]
    CategoriesWrite,
    #[serde(rename = "products.read")]
    ProductsRead,
    #[serde(rename = "products.write")]
    ProductsWrite,
    #[serde(rename = "invoices.read")]
    InvoicesRead,
    #[serde(rename = "invoices.write")]
    InvoicesWrite,
    #[serde(rename = "invoices.delete")]
    InvoicesDelete,
    #[serde(rename = "invoices.send")]
    InvoicesSend,
    #[serde(rename = "chat.use")]
    ChatUse,
    #[serde(rename = "referrals.use")]
    ReferralsUse,
}

impl Permission {
    /// Every permission, in catalogue order.
    pub const ALL: [Permission; 19] = [
        Permission::UsersRead,
        Permission::UsersWrite,
        Permission::RolesRead,
        Permission::RolesWrite,
        Permission::CompanyRead,
        Permission::CompanyWrite,
        Permission::CustomersRead,
        Permission::CustomersWrite,
        Permission::CustomersDelete,
        Permission::CategoriesRead,
        Permission::CategoriesWrite,
        Permission::ProductsRead,
        Permission::ProductsWrite,
        Permission::InvoicesRead,
        Permission::InvoicesWrite,
        Permission::InvoicesDelete,
        Permission::InvoicesSend,
        Permission::ChatUse,
        Permission::ReferralsUse,
    ];

    /// Database / token name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::UsersRead => "users.read",
            Permission::UsersWrite => "users.write",
            Permission::RolesRead => "roles.read",
            Permission::RolesWrite => "roles.write",
            Permission::CompanyRead => "company.read",
            Permission::CompanyWrite => "company.write",
            Permission::CustomersRead => "customers.read",
            Permission::CustomersWrite => "customers.write",
            Permission::CustomersDelete => "customers.delete",
            Permission::CategoriesRead => "categories.read",
            Permission::CategoriesWrite => "categories.write",
            Permission::ProductsRead => "products.read",
            Permission::ProductsWrite => "products.write",
            Permission::InvoicesRead => "invoices.read",
            Permission::InvoicesWrite => "invoices.write",
            Permission::InvoicesDelete => "invoices.delete",
            Permission::InvoicesSend => "invoices.send",
            Permission::ChatUse => "chat.use",
            Permission::ReferralsUse => "referrals.use",
        }
    }

    /// Parse a permission name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }

    /// Human-readable description stored alongside the name.
    pub const fn description(&self) -> &'static str {
        match self {
            Permission::UsersRead => "View users of the company",
            Permission::UsersWrite => "Create, edit and deactivate users",
            Permission::RolesRead => "View roles and permissions",
            Permission::RolesWrite => "Manage roles and their permissions",
            Permission::CompanyRead => "View the company profile",
            Permission::CompanyWrite => "Edit the company profile",
            Permission::CustomersRead => "View customers",
            Permission::CustomersWrite => "Create and edit customers",
            Permission::CustomersDelete => "Delete customers",
            Permission::CategoriesRead => "View product categories",
            Permission::CategoriesWrite => "Manage product categories",
            Permission::ProductsRead => "View products",
            Permission::ProductsWrite => "Manage products",
            Permission::InvoicesRead => "View invoices",
            Permission::InvoicesWrite => "Create, edit and change status of invoices",
            Permission::InvoicesDelete => "Delete draft invoices",
            Permission::InvoicesSend => "Email invoices to customers",
            Permission::ChatUse => "Use internal chat",
            Permission::ReferralsUse => "Refer customers to colleagues",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in role names created by the seeder.
pub mod roles {
    use super::Permission;

    pub const ADMIN: &str = "Admin";
    pub const MANAGER: &str = "Manager";
    pub const SALES: &str = "Sales";

    /// Default grants for the seeded `Manager` role.
    pub const MANAGER_PERMISSIONS: &[Permission] = &[
        Permission::UsersRead,
        Permission::RolesRead,
        Permission::CompanyRead,
        Permission::CustomersRead,
        Permission::CustomersWrite,
        Permission::CustomersDelete,
        Permission::CategoriesRead,
        Permission::CategoriesWrite,
        Permission::ProductsRead,
        Permission::ProductsWrite,
        Permission::InvoicesRead,
        Permission::InvoicesWrite,
        Permission::InvoicesDelete,
        Permission::InvoicesSend,
        Permission::ChatUse,
        Permission::ReferralsUse,
    ];

    /// Default grants for the seeded `Sales` role.
    pub const SALES_PERMISSIONS: &[Permission] = &[
        Permission::CompanyRead,
        Permission::CustomersRead,
        Permission::CustomersWrite,
        Permission::CategoriesRead,
        Permission::ProductsRead,
        Permission::InvoicesRead,
        Permission::InvoicesWrite,
        Permission::InvoicesSend,
        Permission::ChatUse,
        Permission::ReferralsUse,
    ];
}

/// Effective permission names of a user, sorted and deduplicated.
///
/// Holding the `Admin` role grants the whole catalogue regardless of the
/// role's stored grants.
pub fn effective_permissions<'a, I>(role_names: &[String], granted: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if role_names.iter().any(|r| r == roles::ADMIN) {
        return Permission::ALL.iter().map(|p| p.as_str().to_string()).collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
    }

    granted
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_names_round_trip() {
        for p in Permission::ALL {
            assert_eq!(Permission::parse(p.as_str()), Some(p));
        }
        assert_eq!(Permission::parse("nope"), None);
    }

    #[test]
    fn test_serde_uses_dotted_names() {
        let json = serde_json::to_string(&Permission::InvoicesSend).unwrap();
        assert_eq!(json, "\"invoices.send\"");
        let parsed: Permission = serde_json::from_str("\"chat.use\"").unwrap();
        assert_eq!(parsed, Permission::ChatUse);
    }

    #[test]
    fn test_names_are_unique() {
        let names: BTreeSet<_> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), Permission::ALL.len());
    }

    #[test]
    fn test_admin_gets_everything() {
        let perms = effective_permissions(&["Admin".to_string()], ["chat.use"]);
        assert_eq!(perms.len(), Permission::ALL.len());
    }

    #[test]
    fn test_effective_permissions_sorted_and_deduped() {
        let perms = effective_permissions(
            &["Sales".to_string(), "Support".to_string()],
            ["invoices.read", "chat.use", "invoices.read"],
        );
        assert_eq!(perms, vec!["chat.use".to_string(), "invoices.read".to_string()]);
    }
}

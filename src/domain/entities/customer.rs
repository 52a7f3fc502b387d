//! Customer entities (individuals and companies), their contact details and
//! the repository trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

/// Which customer table a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerKind {
    Individual,
    Company,
}

impl CustomerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "company" => Some(Self::Company),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
        }
    }
}

impl fmt::Display for CustomerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to either an individual or a company customer.
///
/// Stored as two nullable foreign keys with a check constraint that exactly
/// one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CustomerRef {
    pub kind: CustomerKind,
    pub id: i64,
}

impl CustomerRef {
    pub fn individual(id: i64) -> Self {
        Self { kind: CustomerKind::Individual, id }
    }

    pub fn company(id: i64) -> Self {
        Self { kind: CustomerKind::Company, id }
    }

    /// Build from the `(individual_id, company_id)` column pair.
    pub fn from_columns(individual_id: Option<i64>, company_id: Option<i64>) -> Option<Self> {
        match (individual_id, company_id) {
            (Some(id), None) => Some(Self::individual(id)),
            (None, Some(id)) => Some(Self::company(id)),
            _ => None,
        }
    }

    /// Split into the `(individual_id, company_id)` column pair.
    pub fn columns(&self) -> (Option<i64>, Option<i64>) {
        match self.kind {
            CustomerKind::Individual => (Some(self.id), None),
            CustomerKind::Company => (None, Some(self.id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhoneKind {
    #[default]
    Mobile,
    Landline,
    Fax,
}

impl PhoneKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "landline" => Self::Landline,
            "fax" => Self::Fax,
            _ => Self::Mobile,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Landline => "landline",
            Self::Fax => "fax",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: i64,
    pub province: Option<String>,
    pub city: Option<String>,
    pub street: String,
    pub postal_code: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub id: i64,
    pub address: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactPhone {
    pub id: i64,
    pub number: String,
    pub kind: PhoneKind,
    pub is_primary: bool,
}

/// Something that can be flagged as the primary entry of its set.
pub trait Primary {
    fn is_primary(&self) -> bool;
    fn set_primary(&mut self, primary: bool);
}

macro_rules! impl_primary {
    ($($t:ty),*) => {
        $(impl Primary for $t {
            fn is_primary(&self) -> bool {
                self.is_primary
            }
            fn set_primary(&mut self, primary: bool) {
                self.is_primary = primary;
            }
        })*
    };
}

impl_primary!(Address, EmailAddress, ContactPhone);

/// Leave exactly one primary entry in a non-empty set: the first one marked,
/// or the first entry when none is marked.
pub fn normalize_primary<T: Primary>(items: &mut [T]) {
    let chosen = items.iter().position(Primary::is_primary).unwrap_or(0);
    for (i, item) in items.iter_mut().enumerate() {
        item.set_primary(i == chosen);
    }
}

/// The owned contact rows of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactInfo {
    pub addresses: Vec<Address>,
    pub emails: Vec<EmailAddress>,
    pub phones: Vec<ContactPhone>,
}

impl ContactInfo {
    pub fn normalize(&mut self) {
        normalize_primary(&mut self.addresses);
        normalize_primary(&mut self.emails);
        normalize_primary(&mut self.phones);
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.is_primary)
            .or_else(|| self.emails.first())
            .map(|e| e.address.as_str())
    }

    pub fn primary_address(&self) -> Option<&Address> {
        self.addresses
            .iter()
            .find(|a| a.is_primary)
            .or_else(|| self.addresses.first())
    }

    pub fn primary_phone(&self) -> Option<&str> {
        self.phones
            .iter()
            .find(|p| p.is_primary)
            .or_else(|| self.phones.first())
            .map(|p| p.number.as_str())
    }
}

/// A natural-person customer. Maps to `customer_individuals`.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerIndividual {
    pub id: i64,
    pub company_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// National code (کد ملی), unique per tenant
    pub national_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub contacts: ContactInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerIndividual {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// A legal-entity customer. Maps to `customer_companies`.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerCompany {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub economic_code: Option<String>,
    /// National id (شناسه ملی), unique per tenant
    pub national_id: Option<String>,
    pub registration_number: Option<String>,
    pub description: Option<String>,
    pub contacts: ContactInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for both customer kinds and their contact rows.
///
/// Every method is scoped by tenant; rows of other tenants are invisible.
/// Create and update write the customer and its contacts in one transaction,
/// update replacing the contact sets wholesale.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list_individuals(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<CustomerIndividual>, i64), AppError>;

    async fn find_individual(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<CustomerIndividual>, AppError>;

    async fn create_individual(
        &self,
        customer: &CustomerIndividual,
    ) -> Result<CustomerIndividual, AppError>;

    async fn update_individual(
        &self,
        customer: &CustomerIndividual,
    ) -> Result<CustomerIndividual, AppError>;

    /// Fails with `Conflict` while invoices reference the customer.
    async fn delete_individual(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    async fn list_companies(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<CustomerCompany>, i64), AppError>;

    async fn find_company(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<CustomerCompany>, AppError>;

    async fn create_company(&self, customer: &CustomerCompany) -> Result<CustomerCompany, AppError>;

    async fn update_company(&self, customer: &CustomerCompany) -> Result<CustomerCompany, AppError>;

    /// Fails with `Conflict` while invoices reference the customer.
    async fn delete_company(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    /// Whether the referenced customer exists in the tenant.
    async fn exists(&self, company_id: i64, customer: CustomerRef) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_customer_ref_serializes_kind_and_id() {
        assert_eq!(
            serde_json::to_value(CustomerRef::company(5)).unwrap(),
            serde_json::json!({"kind": "company", "id": 5})
        );
    }

    fn email(id: i64, address: &str, is_primary: bool) -> EmailAddress {
        EmailAddress {
            id,
            address: address.to_string(),
            is_primary,
        }
    }

    // ==========================================================================
    // CustomerRef Tests
    // ==========================================================================

    #[test]
    fn test_customer_ref_columns() {
        assert_eq!(CustomerRef::individual(5).columns(), (Some(5), None));
        assert_eq!(CustomerRef::company(7).columns(), (None, Some(7)));
    }

    #[test]
    fn test_customer_ref_from_columns_requires_exactly_one() {
        assert_eq!(CustomerRef::from_columns(Some(1), None), Some(CustomerRef::individual(1)));
        assert_eq!(CustomerRef::from_columns(None, Some(2)), Some(CustomerRef::company(2)));
        assert_eq!(CustomerRef::from_columns(Some(1), Some(2)), None);
        assert_eq!(CustomerRef::from_columns(None, None), None);
    }

    #[test]
    fn test_customer_kind_parse() {
        assert_eq!(CustomerKind::parse("Company"), Some(CustomerKind::Company));
        assert_eq!(CustomerKind::parse("individual"), Some(CustomerKind::Individual));
        assert_eq!(CustomerKind::parse("person"), None);
    }

    // ==========================================================================
    // Primary Flag Tests
    // ==========================================================================

    #[test]
    fn test_first_entry_becomes_primary_when_none_marked() {
        let mut emails = vec![email(1, "a@x.ir", false), email(2, "b@x.ir", false)];
        normalize_primary(&mut emails);
        assert!(emails[0].is_primary);
        assert!(!emails[1].is_primary);
    }

    #[test]
    fn test_only_first_marked_entry_stays_primary() {
        let mut emails = vec![
            email(1, "a@x.ir", false),
            email(2, "b@x.ir", true),
            email(3, "c@x.ir", true),
        ];
        normalize_primary(&mut emails);
        let flags: Vec<bool> = emails.iter().map(|e| e.is_primary).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_normalize_empty_set() {
        let mut emails: Vec<EmailAddress> = Vec::new();
        normalize_primary(&mut emails);
        assert!(emails.is_empty());
    }

    #[test]
    fn test_primary_email_lookup() {
        let contacts = ContactInfo {
            emails: vec![email(1, "a@x.ir", false), email(2, "b@x.ir", true)],
            ..ContactInfo::default()
        };
        assert_eq!(contacts.primary_email(), Some("b@x.ir"));
        assert_eq!(ContactInfo::default().primary_email(), None);
    }

    #[test]
    fn test_phone_kind_from_str() {
        assert_eq!(PhoneKind::from_str("FAX"), PhoneKind::Fax);
        assert_eq!(PhoneKind::from_str("landline"), PhoneKind::Landline);
        assert_eq!(PhoneKind::from_str("other"), PhoneKind::Mobile);
    }
}

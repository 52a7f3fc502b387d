//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Ids travel as
//! strings so JavaScript clients keep full 64-bit precision.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::domain::{InvoiceStatus, ReferralDirection, ReferralStatus};
use crate::shared::pagination::PageParams;

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Auth
// =============================================================================

/// Tenant registration: creates the company and its first administrator.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 200, message = "Company name must be 2-200 characters"))]
    pub company_name: String,

    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,
}

/// Login with email or username.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub login: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// =============================================================================
// Users & roles
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub role_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 2, max = 50, message = "Role name must be 2-50 characters"))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 2, max = 50, message = "Role name must be 2-50 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<String>,
}

// =============================================================================
// Company profile
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 2, max = 200, message = "Company name must be 2-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 20))]
    pub economic_code: Option<String>,

    #[validate(custom(function = "crate::shared::validation::company_national_id"))]
    pub national_id: Option<String>,

    #[validate(length(max = 20))]
    pub registration_number: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(length(max = 500))]
    pub address: Option<String>,

    #[validate(length(max = 10))]
    pub postal_code: Option<String>,

    #[validate(url(message = "Invalid logo URL"))]
    pub logo_url: Option<String>,
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(max = 100))]
    pub province: Option<String>,

    #[validate(length(max = 100))]
    pub city: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Street must be 1-500 characters"))]
    pub street: String,

    #[validate(length(equal = 10, message = "Postal code must be 10 digits"))]
    pub postal_code: Option<String>,

    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub address: String,

    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhoneRequest {
    #[validate(length(min = 3, max = 20, message = "Phone number must be 3-20 characters"))]
    pub number: String,

    /// `mobile`, `landline` or `fax`
    pub kind: Option<String>,

    #[serde(default)]
    pub is_primary: bool,
}

/// Body for creating or replacing an individual customer.
#[derive(Debug, Deserialize, Validate)]
pub struct IndividualRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,

    #[validate(custom(function = "crate::shared::validation::national_code"))]
    pub national_code: Option<String>,

    pub birth_date: Option<NaiveDate>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub addresses: Vec<AddressRequest>,

    #[serde(default)]
    #[validate(nested)]
    pub emails: Vec<EmailRequest>,

    #[serde(default)]
    #[validate(nested)]
    pub phones: Vec<PhoneRequest>,
}

/// Body for creating or replacing a company customer.
#[derive(Debug, Deserialize, Validate)]
pub struct CompanyCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 20))]
    pub economic_code: Option<String>,

    #[validate(custom(function = "crate::shared::validation::company_national_id"))]
    pub national_id: Option<String>,

    #[validate(length(max = 20))]
    pub registration_number: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub addresses: Vec<AddressRequest>,

    #[serde(default)]
    #[validate(nested)]
    pub emails: Vec<EmailRequest>,

    #[serde(default)]
    #[validate(nested)]
    pub phones: Vec<PhoneRequest>,
}

/// `?q=&page=&page_size=`
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl SearchQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Search term with surrounding whitespace removed; blank means none.
    pub fn search(&self) -> Option<String> {
        trimmed(&self.q)
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub category_id: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 64, message = "SKU must be 1-64 characters"))]
    pub sku: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub unit_price: i64,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i64>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 64, message = "SKU must be 1-64 characters"))]
    pub sku: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub unit_price: Option<i64>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i64>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ProductQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn search(&self) -> Option<String> {
        trimmed(&self.q)
    }
}

// =============================================================================
// Invoices
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    pub product_id: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// Defaults to the product's current price
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub unit_price: Option<i64>,

    #[validate(range(min = 0, message = "Discount cannot be negative"))]
    pub discount: Option<i64>,
}

/// Body for creating or replacing an invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceRequest {
    /// Generated as `{jalali_year}-{seq:05}` when absent
    #[validate(length(min = 1, max = 32, message = "Invoice number must be 1-32 characters"))]
    pub invoice_number: Option<String>,

    /// `individual` or `company`
    pub customer_kind: String,

    pub customer_id: String,

    /// Defaults to today
    pub issue_date: Option<NaiveDate>,

    pub due_date: Option<NaiveDate>,

    #[validate(range(min = 0, message = "Discount cannot be negative"))]
    pub discount: Option<i64>,

    /// Basis points, 900 = 9%
    #[validate(range(min = 0, max = 10000, message = "Tax rate must be 0-10000 basis points"))]
    pub tax_rate_bp: Option<i32>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "An invoice needs at least one item"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SendInvoiceRequest {
    /// Defaults to the customer's primary email
    #[validate(email(message = "Invalid email format"))]
    pub to: Option<String>,

    #[validate(length(max = 200))]
    pub subject: Option<String>,

    #[validate(length(max = 5000))]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<String>,
    pub customer_kind: Option<String>,
    pub customer_id: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl InvoiceQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn search(&self) -> Option<String> {
        trimmed(&self.q)
    }
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    /// Other participants; the caller is always added
    #[validate(length(min = 1, message = "At least one other member is required"))]
    pub member_ids: Vec<String>,

    /// Defaults to true when more than one other member is given
    pub is_group: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageContentRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    /// Message id; only older messages are returned
    pub before: Option<String>,
    pub limit: Option<i64>,
}

// =============================================================================
// Referrals
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReferralRequest {
    pub referred_user_id: String,

    /// `individual` or `company`
    pub customer_kind: String,

    pub customer_id: String,

    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondReferralRequest {
    pub status: ReferralStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferralQuery {
    pub direction: Option<ReferralDirection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_login_accepts_email_or_username_key() {
        let by_email: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.com","password":"x"}"#).unwrap();
        let by_username: LoginRequest =
            serde_json::from_str(r#"{"username":"ali","password":"x"}"#).unwrap();

        assert_eq!(by_email.login, "a@b.com");
        assert_eq!(by_username.login, "ali");
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: UpdateCategoryRequest = serde_json::from_str(r#"{"name":"Tools"}"#).unwrap();
        let null: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        let set: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id":"42"}"#).unwrap();

        assert_eq!(absent.parent_id, None);
        assert_eq!(null.parent_id, Some(None));
        assert_eq!(set.parent_id, Some(Some("42".to_string())));
    }

    #[test]
    fn test_individual_national_code_is_checked() {
        let mut request: IndividualRequest = serde_json::from_str(
            r#"{"first_name":"Ali","last_name":"Rezaei","national_code":"0499370899"}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());

        request.national_code = Some("0499370898".into());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_invoice_requires_items() {
        let request: InvoiceRequest = serde_json::from_str(
            r#"{"customer_kind":"individual","customer_id":"1","items":[]}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_invoice_item_errors_are_reported() {
        let request: InvoiceRequest = serde_json::from_str(
            r#"{"customer_kind":"individual","customer_id":"1",
                "items":[{"product_id":"9","quantity":0}]}"#,
        )
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.errors().contains_key("items"));
        assert_eq!(serde_json::to_value(&request.items).unwrap()[0]["quantity"], 0);
    }

    #[test]
    fn test_nested_contact_validation() {
        let request: CompanyCustomerRequest = serde_json::from_str(
            r#"{"name":"Pars","emails":[{"address":"not-an-email"}]}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    // ==== Limits agree with the schema ====

    const SCHEMA: &str = include_str!("../../../migrations/20240101000000_initial_schema.sql");

    /// Width of the `VARCHAR(n)` column with the given name.
    fn varchar_width(column: &str) -> usize {
        SCHEMA
            .lines()
            .map(str::trim)
            .filter(|line| line.split_whitespace().next() == Some(column))
            .find_map(|line| {
                let start = line.find("VARCHAR(")? + "VARCHAR(".len();
                let end = start + line[start..].find(')')?;
                line[start..end].parse().ok()
            })
            .unwrap()
    }

    fn register_with_username(username: &str) -> RegisterRequest {
        RegisterRequest {
            company_name: "Pars".into(),
            username: username.into(),
            email: "owner@example.com".into(),
            password: "password123".into(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_username_limit_matches_column() {
        let width = varchar_width("username");
        assert_eq!(width, 32);

        assert!(register_with_username(&"u".repeat(width)).validate().is_ok());
        assert!(register_with_username(&"u".repeat(width + 1)).validate().is_err());

        let create: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "username": "u".repeat(width + 1),
            "email": "new@example.com",
            "password": "password123",
        }))
        .unwrap();
        assert!(create.validate().is_err());
    }

    #[test]
    fn test_search_query_trims_blank() {
        let query = SearchQuery {
            q: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(query.search(), None);
        assert_eq!(query.page_params().page_size(), 20);
    }
}

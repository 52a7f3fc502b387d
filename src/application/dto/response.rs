//! Response DTOs
//!
//! Data structures for API response bodies.

use chrono::NaiveDate;
use serde::Serialize;

use crate::application::services::AuthTokens;
use crate::domain::services::persian::gregorian_to_jalali;
use crate::domain::{
    Address, Category, ChatMessage, ContactInfo, ContactPhone, ConversationSummary,
    CustomerCompany, CustomerIndividual, EmailAddress, Invoice, InvoiceAttachment, InvoiceItem,
    MainCompany, PermissionRecord, Product, Role, User, UserReferral,
};

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Registration response (includes tenant, user and tokens)
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub company: CompanyResponse,
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

// =============================================================================
// Users & roles
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub company_id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub roles: Vec<String>,
    /// Only present on `/users/me`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: User, roles: Vec<String>) -> Self {
        Self {
            id: user.id.to_string(),
            company_id: user.company_id.to_string(),
            full_name: user.full_name(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            is_active: user.is_active,
            roles,
            permissions: None,
            last_login_at: user.last_login_at.map(|t| t.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub created_at: String,
}

impl RoleResponse {
    pub fn from_role(role: Role, permissions: Vec<String>) -> Self {
        Self {
            id: role.id.to_string(),
            name: role.name,
            description: role.description,
            permissions,
            created_at: role.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub name: String,
    pub description: Option<String>,
}

impl From<PermissionRecord> for PermissionResponse {
    fn from(p: PermissionRecord) -> Self {
        Self {
            name: p.name,
            description: p.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyResponse {
    pub id: String,
    pub name: String,
    pub economic_code: Option<String>,
    pub national_id: Option<String>,
    pub registration_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MainCompany> for CompanyResponse {
    fn from(c: MainCompany) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name,
            economic_code: c.economic_code,
            national_id: c.national_id,
            registration_number: c.registration_number,
            phone: c.phone,
            address: c.address,
            postal_code: c.postal_code,
            logo_url: c.logo_url,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub id: String,
    pub province: Option<String>,
    pub city: Option<String>,
    pub street: String,
    pub postal_code: Option<String>,
    pub is_primary: bool,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        Self {
            id: a.id.to_string(),
            province: a.province,
            city: a.city,
            street: a.street,
            postal_code: a.postal_code,
            is_primary: a.is_primary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub id: String,
    pub address: String,
    pub is_primary: bool,
}

impl From<EmailAddress> for EmailResponse {
    fn from(e: EmailAddress) -> Self {
        Self {
            id: e.id.to_string(),
            address: e.address,
            is_primary: e.is_primary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhoneResponse {
    pub id: String,
    pub number: String,
    pub kind: String,
    pub is_primary: bool,
}

impl From<ContactPhone> for PhoneResponse {
    fn from(p: ContactPhone) -> Self {
        Self {
            id: p.id.to_string(),
            number: p.number,
            kind: p.kind.as_str().to_string(),
            is_primary: p.is_primary,
        }
    }
}

/// The three owned contact collections, flattened into the customer body.
#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub addresses: Vec<AddressResponse>,
    pub emails: Vec<EmailResponse>,
    pub phones: Vec<PhoneResponse>,
}

impl From<ContactInfo> for ContactsResponse {
    fn from(c: ContactInfo) -> Self {
        Self {
            addresses: c.addresses.into_iter().map(Into::into).collect(),
            emails: c.emails.into_iter().map(Into::into).collect(),
            phones: c.phones.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndividualResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub national_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub contacts: ContactsResponse,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CustomerIndividual> for IndividualResponse {
    fn from(c: CustomerIndividual) -> Self {
        Self {
            id: c.id.to_string(),
            display_name: c.display_name(),
            first_name: c.first_name,
            last_name: c.last_name,
            national_code: c.national_code,
            birth_date: c.birth_date,
            description: c.description,
            contacts: c.contacts.into(),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyCustomerResponse {
    pub id: String,
    pub name: String,
    pub economic_code: Option<String>,
    pub national_id: Option<String>,
    pub registration_number: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub contacts: ContactsResponse,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CustomerCompany> for CompanyCustomerResponse {
    fn from(c: CustomerCompany) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name,
            economic_code: c.economic_code,
            national_id: c.national_id,
            registration_number: c.registration_number,
            description: c.description,
            contacts: c.contacts.into(),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: String,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name,
            description: c.description,
            parent_id: c.parent_id.map(|id| id.to_string()),
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price: i64,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.to_string(),
            category_id: p.category_id.map(|id| id.to_string()),
            name: p.name,
            sku: p.sku,
            description: p.description,
            unit: p.unit,
            unit_price: p.unit_price,
            stock_quantity: p.stock_quantity,
            is_active: p.is_active,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Invoices
// =============================================================================

#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    pub id: String,
    pub product_id: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub discount: i64,
    /// quantity × unit price − discount
    pub net: i64,
    pub position: i32,
}

impl From<InvoiceItem> for InvoiceItemResponse {
    fn from(i: InvoiceItem) -> Self {
        let net = (i.quantity as i64)
            .saturating_mul(i.unit_price)
            .saturating_sub(i.discount);
        Self {
            id: i.id.to_string(),
            product_id: i.product_id.to_string(),
            description: i.description,
            quantity: i.quantity,
            unit_price: i.unit_price,
            discount: i.discount,
            net,
            position: i.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub uploaded_by: String,
    pub created_at: String,
}

impl AttachmentResponse {
    pub fn from_attachment(a: InvoiceAttachment, url: String) -> Self {
        Self {
            id: a.id.to_string(),
            original_name: a.original_name,
            content_type: a.content_type,
            size_bytes: a.size_bytes,
            url,
            uploaded_by: a.uploaded_by.to_string(),
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub invoice_number: String,
    pub customer_kind: String,
    pub customer_id: String,
    pub issue_date: NaiveDate,
    /// `1403/01/01`
    pub issue_date_jalali: String,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub discount: i64,
    pub tax_rate_bp: i32,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub total: i64,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    /// Present on single-invoice responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItemResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentResponse>>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(i: Invoice) -> Self {
        Self {
            id: i.id.to_string(),
            invoice_number: i.invoice_number,
            customer_kind: i.customer.kind.as_str().to_string(),
            customer_id: i.customer.id.to_string(),
            issue_date: i.issue_date,
            issue_date_jalali: gregorian_to_jalali(i.issue_date).to_string(),
            due_date: i.due_date,
            status: i.status.as_str().to_string(),
            discount: i.discount,
            tax_rate_bp: i.tax_rate_bp,
            subtotal: i.subtotal,
            tax_amount: i.tax_amount,
            total: i.total,
            notes: i.notes,
            created_by: i.created_by.to_string(),
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.to_rfc3339(),
            items: None,
            attachments: None,
        }
    }
}

impl InvoiceResponse {
    pub fn with_items(mut self, items: Vec<InvoiceItem>) -> Self {
        self.items = Some(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentResponse>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

// =============================================================================
// Chat & referrals
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub title: Option<String>,
    pub is_group: bool,
    pub created_by: String,
    pub member_ids: Vec<String>,
    pub unread_count: i64,
    pub created_at: String,
    pub last_activity_at: String,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(s: ConversationSummary) -> Self {
        let c = s.conversation;
        Self {
            id: c.id.to_string(),
            title: c.title,
            is_group: c.is_group,
            created_by: c.created_by.to_string(),
            member_ids: s.member_ids.iter().map(|id| id.to_string()).collect(),
            unread_count: s.unread_count,
            created_at: c.created_at.to_rfc3339(),
            last_activity_at: c.last_activity_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub edited_at: Option<String>,
    pub created_at: String,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id.to_string(),
            conversation_id: m.conversation_id.to_string(),
            sender_id: m.sender_id.to_string(),
            content: m.content,
            edited_at: m.edited_at.map(|t| t.to_rfc3339()),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub customer_kind: String,
    pub customer_id: String,
    pub note: Option<String>,
    pub status: String,
    pub responded_at: Option<String>,
    pub created_at: String,
}

impl From<UserReferral> for ReferralResponse {
    fn from(r: UserReferral) -> Self {
        Self {
            id: r.id.to_string(),
            referrer_id: r.referrer_id.to_string(),
            referred_user_id: r.referred_user_id.to_string(),
            customer_kind: r.customer.kind.as_str().to_string(),
            customer_id: r.customer.id.to_string(),
            note: r.note,
            status: r.status.as_str().to_string(),
            responded_at: r.responded_at.map(|t| t.to_rfc3339()),
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerRef, InvoiceStatus};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invoice_response_serializes_ids_as_strings() {
        let now = Utc::now();
        let invoice = Invoice {
            id: 9_007_199_254_740_993,
            company_id: 1,
            invoice_number: "1403-00001".into(),
            customer: CustomerRef::company(77),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            due_date: None,
            status: InvoiceStatus::Draft,
            discount: 0,
            tax_rate_bp: 900,
            subtotal: 1000,
            tax_amount: 90,
            total: 1090,
            notes: None,
            created_by: 5,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(InvoiceResponse::from(invoice)).unwrap();
        assert_eq!(json["id"], "9007199254740993");
        assert_eq!(json["customer_kind"], "company");
        assert_eq!(json["issue_date_jalali"], "1403/01/01");
        assert!(json.get("items").is_none());
    }

    #[test]
    fn test_item_net() {
        let item = InvoiceItem {
            id: 1,
            invoice_id: 2,
            product_id: 3,
            description: None,
            quantity: 3,
            unit_price: 1_000,
            discount: 500,
            position: 0,
        };
        assert_eq!(InvoiceItemResponse::from(item).net, 2_500);
    }
}

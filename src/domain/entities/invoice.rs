//! Invoice entity, line items, attachments and the repository trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::customer::CustomerRef;
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

/// Invoice lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "issued" => Some(Self::Issued),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Allowed moves: draft→issued, draft→cancelled, issued→paid,
    /// issued→cancelled.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Issued) | (Draft, Cancelled) | (Issued, Paid) | (Issued, Cancelled)
        )
    }

    /// Only drafts may be edited or deleted.
    pub fn is_editable(&self) -> bool {
        *self == Self::Draft
    }

    /// Persian label used on the print view.
    pub fn persian_label(&self) -> &'static str {
        match self {
            Self::Draft => "پیش‌نویس",
            Self::Issued => "صادر شده",
            Self::Paid => "پرداخت شده",
            Self::Cancelled => "باطل شده",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invoice header.
///
/// Maps to `invoices`. `(company_id, invoice_number)` is unique. The stored
/// `subtotal`, `tax_amount` and `total` are recomputed from the items on
/// every write.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub company_id: i64,
    pub invoice_number: String,
    pub customer: CustomerRef,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    /// Invoice-level discount in Rials
    pub discount: i64,
    /// Tax rate in basis points (900 = 9%)
    pub tax_rate_bp: i32,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub total: i64,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an invoice. Maps to `invoice_items` (cascade with invoice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    /// Per-line discount in Rials
    pub discount: i64,
    /// 0-based display order
    pub position: i32,
}

/// A file uploaded against an invoice. Maps to `invoice_attachments`.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceAttachment {
    pub id: i64,
    pub invoice_id: i64,
    pub original_name: String,
    /// Name of the file inside the uploads directory
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Filters for invoice listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer: Option<CustomerRef>,
    /// Matches the invoice number or notes
    pub search: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Page through a tenant's invoices, newest issue date first.
    async fn list(
        &self,
        company_id: i64,
        filter: InvoiceFilter,
        page: PageParams,
    ) -> Result<(Vec<Invoice>, i64), AppError>;

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Invoice>, AppError>;

    /// Items of an invoice in display order.
    async fn items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, AppError>;

    /// Insert the header and items in one transaction.
    async fn create(&self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<Invoice, AppError>;

    /// Update the header and replace the items of a draft in one
    /// transaction. `Conflict` when the invoice is no longer a draft.
    async fn replace(&self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<Invoice, AppError>;

    /// Move an invoice from `from` to `to`. `None` when the stored status is
    /// no longer `from`.
    async fn update_status(
        &self,
        company_id: i64,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError>;

    /// Delete a draft invoice. `Conflict` when it is no longer a draft.
    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    /// Next free sequence number for invoice numbers of the form `{prefix}-{seq}`.
    async fn next_sequence(&self, company_id: i64, prefix: &str) -> Result<i64, AppError>;

    /// Insert a batch of attachment rows in one transaction.
    async fn add_attachments(
        &self,
        attachments: &[InvoiceAttachment],
    ) -> Result<Vec<InvoiceAttachment>, AppError>;

    async fn attachments(&self, invoice_id: i64) -> Result<Vec<InvoiceAttachment>, AppError>;

    async fn find_attachment(
        &self,
        invoice_id: i64,
        id: i64,
    ) -> Result<Option<InvoiceAttachment>, AppError>;

    async fn delete_attachment(&self, invoice_id: i64, id: i64) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use InvoiceStatus::*;

    #[test_case(Draft, Issued, true)]
    #[test_case(Draft, Cancelled, true)]
    #[test_case(Issued, Paid, true)]
    #[test_case(Issued, Cancelled, true)]
    #[test_case(Draft, Paid, false)]
    #[test_case(Issued, Draft, false)]
    #[test_case(Paid, Cancelled, false)]
    #[test_case(Cancelled, Issued, false)]
    #[test_case(Draft, Draft, false)]
    fn test_transitions(from: InvoiceStatus, to: InvoiceStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in [Draft, Issued, Paid, Cancelled] {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(status));
            assert_eq!(status.to_string(), status.as_str());
        }
        assert_eq!(InvoiceStatus::parse("ISSUED"), Some(Issued));
        assert_eq!(InvoiceStatus::parse("void"), None);
    }

    #[test]
    fn test_only_drafts_are_editable() {
        assert!(Draft.is_editable());
        assert!(!Issued.is_editable());
        assert!(!Paid.is_editable());
        assert!(!Cancelled.is_editable());
    }
}

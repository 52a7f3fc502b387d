//! Invoice Repository Implementation
//!
//! Headers live in `invoices`, lines in `invoice_items` and uploaded files
//! in `invoice_attachments`. The customer is stored in one of two nullable
//! columns depending on its kind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    CustomerRef, Invoice, InvoiceAttachment, InvoiceFilter, InvoiceItem, InvoiceRepository,
    InvoiceStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{like_pattern, PageParams};

const INVOICE_COLUMNS: &str = "id, company_id, invoice_number, customer_individual_id, \
                               customer_company_id, issue_date, due_date, status, discount, \
                               tax_rate_bp, subtotal, tax_amount, total, notes, created_by, \
                               created_at, updated_at";

const INVOICE_FILTER: &str = r#"
    company_id = $1
    AND ($2::TEXT IS NULL OR status = $2)
    AND ($3::BIGINT IS NULL OR customer_individual_id = $3)
    AND ($4::BIGINT IS NULL OR customer_company_id = $4)
    AND ($5::TEXT IS NULL OR invoice_number ILIKE $5 OR notes ILIKE $5)
"#;

const NUMBER_TAKEN: &str = "An invoice with this number already exists";
const NOT_DRAFT: &str = "Only draft invoices can be changed";

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    company_id: i64,
    invoice_number: String,
    customer_individual_id: Option<i64>,
    customer_company_id: Option<i64>,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    status: String,
    discount: i64,
    tax_rate_bp: i32,
    subtotal: i64,
    tax_amount: i64,
    total: i64,
    notes: Option<String>,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice, AppError> {
        let customer = CustomerRef::from_columns(self.customer_individual_id, self.customer_company_id)
            .ok_or_else(|| AppError::Internal(format!("Invoice {} has no customer", self.id)))?;
        let status = InvoiceStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Invoice {} has unknown status '{}'", self.id, self.status))
        })?;

        Ok(Invoice {
            id: self.id,
            company_id: self.company_id,
            invoice_number: self.invoice_number,
            customer,
            issue_date: self.issue_date,
            due_date: self.due_date,
            status,
            discount: self.discount,
            tax_rate_bp: self.tax_rate_bp,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            total: self.total,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    invoice_id: i64,
    product_id: i64,
    description: Option<String>,
    quantity: i32,
    unit_price: i64,
    discount: i64,
    position: i32,
}

impl ItemRow {
    fn into_item(self) -> InvoiceItem {
        InvoiceItem {
            id: self.id,
            invoice_id: self.invoice_id,
            product_id: self.product_id,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
            position: self.position,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    invoice_id: i64,
    original_name: String,
    stored_name: String,
    content_type: String,
    size_bytes: i64,
    uploaded_by: i64,
    created_at: DateTime<Utc>,
}

impl AttachmentRow {
    fn into_attachment(self) -> InvoiceAttachment {
        InvoiceAttachment {
            id: self.id,
            invoice_id: self.invoice_id,
            original_name: self.original_name,
            stored_name: self.stored_name,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            uploaded_by: self.uploaded_by,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL invoice repository implementation.
#[derive(Clone)]
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: i64,
    items: &[InvoiceItem],
) -> Result<(), AppError> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, product_id, description, quantity,
                                       unit_price, discount, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(invoice_id)
        .bind(item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.discount)
        .bind(item.position)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn list(
        &self,
        company_id: i64,
        filter: InvoiceFilter,
        page: PageParams,
    ) -> Result<(Vec<Invoice>, i64), AppError> {
        let status = filter.status.map(|s| s.as_str());
        let (individual_id, customer_company_id) =
            filter.customer.map(|c| c.columns()).unwrap_or((None, None));
        let pattern = filter.search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {INVOICE_FILTER} \
             ORDER BY issue_date DESC, id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(company_id)
        .bind(status)
        .bind(individual_id)
        .bind(customer_company_id)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM invoices WHERE {INVOICE_FILTER}"
        ))
        .bind(company_id)
        .bind(status)
        .bind(individual_id)
        .bind(customer_company_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let invoices = rows
            .into_iter()
            .map(|r| r.into_invoice())
            .collect::<Result<Vec<_>, _>>()?;

        Ok((invoices, total))
    }

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<Invoice>, AppError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_invoice()).transpose()
    }

    async fn items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, AppError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, invoice_id, product_id, description, quantity, unit_price, discount, position
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_item()).collect())
    }

    async fn create(&self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<Invoice, AppError> {
        let (individual_id, customer_company_id) = invoice.customer.columns();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            INSERT INTO invoices (id, company_id, invoice_number, customer_individual_id,
                                  customer_company_id, issue_date, due_date, status, discount,
                                  tax_rate_bp, subtotal, tax_amount, total, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice.id)
        .bind(invoice.company_id)
        .bind(&invoice.invoice_number)
        .bind(individual_id)
        .bind(customer_company_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(invoice.discount)
        .bind(invoice.tax_rate_bp)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.total)
        .bind(&invoice.notes)
        .bind(invoice.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, NUMBER_TAKEN))?;

        insert_items(&mut tx, invoice.id, items).await?;
        tx.commit().await?;

        row.into_invoice()
    }

    async fn replace(&self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<Invoice, AppError> {
        let (individual_id, customer_company_id) = invoice.customer.columns();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            UPDATE invoices
            SET invoice_number = $3, customer_individual_id = $4, customer_company_id = $5,
                issue_date = $6, due_date = $7, discount = $8, tax_rate_bp = $9,
                subtotal = $10, tax_amount = $11, total = $12, notes = $13, updated_at = NOW()
            WHERE company_id = $1 AND id = $2 AND status = 'draft'
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice.company_id)
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(individual_id)
        .bind(customer_company_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.discount)
        .bind(invoice.tax_rate_bp)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.total)
        .bind(&invoice.notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, NUMBER_TAKEN))?
        .ok_or_else(|| AppError::Conflict(NOT_DRAFT.into()))?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice.id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, invoice.id, items).await?;

        tx.commit().await?;
        row.into_invoice()
    }

    async fn update_status(
        &self,
        company_id: i64,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            UPDATE invoices
            SET status = $4, updated_at = NOW()
            WHERE company_id = $1 AND id = $2 AND status = $3
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(company_id)
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_invoice()).transpose()
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM invoices WHERE company_id = $1 AND id = $2 AND status = 'draft'",
        )
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(NOT_DRAFT.into()));
        }
        Ok(())
    }

    async fn next_sequence(&self, company_id: i64, prefix: &str) -> Result<i64, AppError> {
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(CAST(substring(invoice_number FROM length($2) + 2) AS BIGINT)), 0) + 1
            FROM invoices
            WHERE company_id = $1
              AND starts_with(invoice_number, $2 || '-')
              AND substring(invoice_number FROM length($2) + 2) ~ '^[0-9]{1,18}$'
            "#,
        )
        .bind(company_id)
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    async fn add_attachments(
        &self,
        attachments: &[InvoiceAttachment],
    ) -> Result<Vec<InvoiceAttachment>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let row = sqlx::query_as::<_, AttachmentRow>(
                r#"
                INSERT INTO invoice_attachments (id, invoice_id, original_name, stored_name,
                                                 content_type, size_bytes, uploaded_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, invoice_id, original_name, stored_name, content_type, size_bytes,
                          uploaded_by, created_at
                "#,
            )
            .bind(attachment.id)
            .bind(attachment.invoice_id)
            .bind(&attachment.original_name)
            .bind(&attachment.stored_name)
            .bind(&attachment.content_type)
            .bind(attachment.size_bytes)
            .bind(attachment.uploaded_by)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(row.into_attachment());
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn attachments(&self, invoice_id: i64) -> Result<Vec<InvoiceAttachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, invoice_id, original_name, stored_name, content_type, size_bytes,
                   uploaded_by, created_at
            FROM invoice_attachments
            WHERE invoice_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_attachment()).collect())
    }

    async fn find_attachment(
        &self,
        invoice_id: i64,
        id: i64,
    ) -> Result<Option<InvoiceAttachment>, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, invoice_id, original_name, stored_name, content_type, size_bytes,
                   uploaded_by, created_at
            FROM invoice_attachments
            WHERE invoice_id = $1 AND id = $2
            "#,
        )
        .bind(invoice_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_attachment()))
    }

    async fn delete_attachment(&self, invoice_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM invoice_attachments WHERE invoice_id = $1 AND id = $2")
            .bind(invoice_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attachment not found".into()));
        }
        Ok(())
    }
}

//! Invoice Service
//!
//! Invoice lifecycle (draft, issued, paid, cancelled), pricing, numbering,
//! the printable document, PDF delivery by email and file attachments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::application::dto::request::{InvoiceItemRequest, InvoiceRequest, SendInvoiceRequest};
use crate::application::dto::{parse_customer_ref, parse_id};
use crate::config::{InvoiceSettings, UploadSettings};
use crate::domain::services::persian::gregorian_to_jalali;
use crate::domain::services::{
    calculate_totals, totals_for_items, DocumentLine, InvoiceDocument, LineInput, Party, TotalsError,
};
use crate::domain::{
    Address, CompanyRepository, CustomerKind, CustomerRef, CustomerRepository, Invoice,
    InvoiceAttachment, InvoiceFilter, InvoiceItem, InvoiceRepository, InvoiceStatus, MainCompany,
    Product, ProductRepository,
};
use crate::infrastructure::email::{EmailAttachment, EmailError, EmailSender, OutgoingEmail};
use crate::infrastructure::pdf::{render_invoice_pdf, PdfError};
use crate::infrastructure::storage::AttachmentStorage;
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::snowflake::SnowflakeGenerator;

/// Longest accepted upload file name, in characters; the width of
/// `invoice_attachments.original_name`.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// An invoice with its items and attachments.
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub attachments: Vec<InvoiceAttachment>,
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A rendered PDF ready to be served.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("Invoice not found")]
    NotFound,

    #[error("Attachment not found")]
    AttachmentNotFound,

    #[error("Only draft invoices can be changed; this invoice is {0}")]
    NotEditable(InvoiceStatus),

    #[error("Cannot move an invoice from {from} to {to}")]
    InvalidTransition { from: InvoiceStatus, to: InvoiceStatus },

    #[error("Invoice status was changed by another request; reload and retry")]
    StatusChanged,

    #[error("customer_id: customer does not exist")]
    CustomerNotFound,

    #[error("items: product {0} does not exist")]
    ProductNotFound(i64),

    #[error(transparent)]
    Totals(#[from] TotalsError),

    #[error("No recipient address: pass 'to' or add an email to the customer")]
    NoRecipient,

    #[error("File type '{0}' is not allowed")]
    ContentTypeNotAllowed(String),

    #[error("File '{0}' exceeds the upload size limit")]
    FileTooLarge(String),

    #[error("File name exceeds {MAX_FILE_NAME_LEN} characters")]
    FileNameTooLong,

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::NotFound => AppError::NotFound("Invoice not found".into()),
            InvoiceError::AttachmentNotFound => AppError::NotFound("Attachment not found".into()),
            e @ (InvoiceError::NotEditable(_)
            | InvoiceError::InvalidTransition { .. }
            | InvoiceError::StatusChanged) => AppError::Conflict(e.to_string()),
            e @ (InvoiceError::CustomerNotFound
            | InvoiceError::ProductNotFound(_)
            | InvoiceError::Totals(_)) => AppError::validation(e.to_string()),
            e @ (InvoiceError::NoRecipient
            | InvoiceError::ContentTypeNotAllowed(_)
            | InvoiceError::FileNameTooLong) => AppError::BadRequest(e.to_string()),
            e @ InvoiceError::FileTooLarge(_) => AppError::PayloadTooLarge(e.to_string()),
            InvoiceError::Email(EmailError::InvalidAddress(addr)) => {
                AppError::BadRequest(format!("Invalid recipient address: {}", addr))
            }
            InvoiceError::Email(e) => AppError::Unavailable(e.to_string()),
            InvoiceError::Pdf(e) => e.into(),
            InvoiceError::Repository(e) => e,
        }
    }
}

#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn list(
        &self,
        company_id: i64,
        filter: InvoiceFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, InvoiceError>;

    async fn get(&self, company_id: i64, id: i64) -> Result<InvoiceDetails, InvoiceError>;

    async fn create(
        &self,
        company_id: i64,
        created_by: i64,
        request: InvoiceRequest,
    ) -> Result<InvoiceDetails, InvoiceError>;

    /// Replace header and items of a draft.
    async fn update(
        &self,
        company_id: i64,
        id: i64,
        request: InvoiceRequest,
    ) -> Result<InvoiceDetails, InvoiceError>;

    async fn change_status(
        &self,
        company_id: i64,
        id: i64,
        status: InvoiceStatus,
    ) -> Result<Invoice, InvoiceError>;

    /// Delete a draft together with its stored attachment files.
    async fn delete(&self, company_id: i64, id: i64) -> Result<(), InvoiceError>;

    /// The render-ready document with seller, buyer and priced lines.
    async fn document(&self, company_id: i64, id: i64) -> Result<InvoiceDocument, InvoiceError>;

    async fn render_pdf(&self, company_id: i64, id: i64) -> Result<RenderedPdf, InvoiceError>;

    /// Email the PDF; returns the address it was sent to.
    async fn send_email(
        &self,
        company_id: i64,
        id: i64,
        request: SendInvoiceRequest,
    ) -> Result<String, InvoiceError>;

    async fn attachments(&self, company_id: i64, id: i64) -> Result<Vec<InvoiceAttachment>, InvoiceError>;

    async fn add_attachments(
        &self,
        company_id: i64,
        id: i64,
        uploaded_by: i64,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<InvoiceAttachment>, InvoiceError>;

    async fn delete_attachment(
        &self,
        company_id: i64,
        id: i64,
        attachment_id: i64,
    ) -> Result<(), InvoiceError>;
}

pub struct InvoiceServiceImpl<I, Cu, P, Co>
where
    I: InvoiceRepository,
    Cu: CustomerRepository,
    P: ProductRepository,
    Co: CompanyRepository,
{
    invoice_repo: Arc<I>,
    customer_repo: Arc<Cu>,
    product_repo: Arc<P>,
    company_repo: Arc<Co>,
    mailer: Arc<dyn EmailSender>,
    storage: Arc<AttachmentStorage>,
    id_generator: Arc<SnowflakeGenerator>,
    invoice_settings: InvoiceSettings,
    upload_settings: UploadSettings,
}

/// Header fields and priced items derived from a request.
struct PreparedInvoice {
    customer: CustomerRef,
    issue_date: NaiveDate,
    items: Vec<InvoiceItem>,
    discount: i64,
    tax_rate_bp: i32,
    subtotal: i64,
    tax_amount: i64,
    total: i64,
}

fn join_address(address: &Address) -> String {
    [address.province.as_deref(), address.city.as_deref(), Some(address.street.as_str())]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn seller_party(company: &MainCompany) -> Party {
    Party {
        name: company.name.clone(),
        national_id: company.national_id.clone(),
        economic_code: company.economic_code.clone(),
        address: company.address.clone(),
        postal_code: company.postal_code.clone(),
        phone: company.phone.clone(),
        email: None,
    }
}

/// `1403-00012` → `invoice-1403-00012.pdf`
fn pdf_file_name(invoice_number: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("invoice-{}.pdf", safe)
}

impl<I, Cu, P, Co> InvoiceServiceImpl<I, Cu, P, Co>
where
    I: InvoiceRepository,
    Cu: CustomerRepository,
    P: ProductRepository,
    Co: CompanyRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoice_repo: Arc<I>,
        customer_repo: Arc<Cu>,
        product_repo: Arc<P>,
        company_repo: Arc<Co>,
        mailer: Arc<dyn EmailSender>,
        storage: Arc<AttachmentStorage>,
        id_generator: Arc<SnowflakeGenerator>,
        invoice_settings: InvoiceSettings,
        upload_settings: UploadSettings,
    ) -> Self {
        Self {
            invoice_repo,
            customer_repo,
            product_repo,
            company_repo,
            mailer,
            storage,
            id_generator,
            invoice_settings,
            upload_settings,
        }
    }

    async fn find(&self, company_id: i64, id: i64) -> Result<Invoice, InvoiceError> {
        self.invoice_repo
            .find_by_id(company_id, id)
            .await?
            .ok_or(InvoiceError::NotFound)
    }

    /// Products of the tenant keyed by id; any missing id is an error.
    async fn products_for(&self, company_id: i64, ids: &[i64]) -> Result<HashMap<i64, Product>, InvoiceError> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let products: HashMap<i64, Product> = self
            .product_repo
            .find_by_ids(company_id, &unique)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        if let Some(missing) = unique.iter().find(|id| !products.contains_key(id)) {
            return Err(InvoiceError::ProductNotFound(*missing));
        }
        Ok(products)
    }

    /// Validate references and price the items of a create/update request.
    async fn prepare(
        &self,
        company_id: i64,
        invoice_id: i64,
        request: &InvoiceRequest,
    ) -> Result<PreparedInvoice, InvoiceError> {
        let customer = parse_customer_ref(&request.customer_kind, &request.customer_id)?;
        if !self.customer_repo.exists(company_id, customer).await? {
            return Err(InvoiceError::CustomerNotFound);
        }

        let product_ids = request
            .items
            .iter()
            .map(|item| parse_id(&item.product_id, "items.product_id"))
            .collect::<Result<Vec<_>, _>>()?;
        let products = self.products_for(company_id, &product_ids).await?;

        let items: Vec<InvoiceItem> = request
            .items
            .iter()
            .zip(&product_ids)
            .enumerate()
            .map(|(position, (item, product_id))| {
                self.build_item(invoice_id, position, item, &products[product_id])
            })
            .collect();

        let discount = request.discount.unwrap_or(0);
        let tax_rate_bp = request
            .tax_rate_bp
            .unwrap_or(self.invoice_settings.default_tax_rate_bp);
        let lines: Vec<LineInput> = items.iter().map(LineInput::from).collect();
        let totals = calculate_totals(&lines, discount, tax_rate_bp)?;

        Ok(PreparedInvoice {
            customer,
            issue_date: request.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
            items,
            discount,
            tax_rate_bp,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: totals.total,
        })
    }

    fn build_item(
        &self,
        invoice_id: i64,
        position: usize,
        item: &InvoiceItemRequest,
        product: &Product,
    ) -> InvoiceItem {
        InvoiceItem {
            id: self.id_generator.generate(),
            invoice_id,
            product_id: product.id,
            description: item
                .description
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            quantity: item.quantity,
            unit_price: item.unit_price.unwrap_or(product.unit_price),
            discount: item.discount.unwrap_or(0),
            position: position as i32,
        }
    }

    /// `{jalali_year}-{seq:05}`, numbered per tenant and year.
    async fn next_number(&self, company_id: i64, issue_date: NaiveDate) -> Result<String, InvoiceError> {
        let prefix = gregorian_to_jalali(issue_date).year.to_string();
        let seq = self.invoice_repo.next_sequence(company_id, &prefix).await?;
        Ok(format!("{}-{:05}", prefix, seq))
    }

    async fn details(&self, invoice: Invoice) -> Result<InvoiceDetails, InvoiceError> {
        let items = self.invoice_repo.items(invoice.id).await?;
        let attachments = self.invoice_repo.attachments(invoice.id).await?;
        Ok(InvoiceDetails {
            invoice,
            items,
            attachments,
        })
    }

    async fn buyer_party(&self, company_id: i64, customer: CustomerRef) -> Result<Party, InvoiceError> {
        match customer.kind {
            CustomerKind::Individual => {
                let c = self
                    .customer_repo
                    .find_individual(company_id, customer.id)
                    .await?
                    .ok_or(InvoiceError::CustomerNotFound)?;
                let address = c.contacts.primary_address();
                Ok(Party {
                    name: c.display_name(),
                    national_id: c.national_code.clone(),
                    economic_code: None,
                    address: address.map(join_address),
                    postal_code: address.and_then(|a| a.postal_code.clone()),
                    phone: c.contacts.primary_phone().map(str::to_string),
                    email: c.contacts.primary_email().map(str::to_string),
                })
            }
            CustomerKind::Company => {
                let c = self
                    .customer_repo
                    .find_company(company_id, customer.id)
                    .await?
                    .ok_or(InvoiceError::CustomerNotFound)?;
                let address = c.contacts.primary_address();
                Ok(Party {
                    name: c.name.clone(),
                    national_id: c.national_id.clone(),
                    economic_code: c.economic_code.clone(),
                    address: address.map(join_address),
                    postal_code: address.and_then(|a| a.postal_code.clone()),
                    phone: c.contacts.primary_phone().map(str::to_string),
                    email: c.contacts.primary_email().map(str::to_string),
                })
            }
        }
    }

    fn check_upload(&self, file: &UploadedFile) -> Result<(), InvoiceError> {
        if file.file_name.chars().count() > MAX_FILE_NAME_LEN {
            return Err(InvoiceError::FileNameTooLong);
        }
        if file.data.len() > self.upload_settings.max_file_size {
            return Err(InvoiceError::FileTooLarge(file.file_name.clone()));
        }
        let allowed = &self.upload_settings.allowed_content_types;
        if !allowed.is_empty() && !allowed.iter().any(|t| t.eq_ignore_ascii_case(&file.content_type)) {
            return Err(InvoiceError::ContentTypeNotAllowed(file.content_type.clone()));
        }
        Ok(())
    }

    /// Remove stored files whose rows were never written.
    async fn discard_files(&self, stored_names: &[String]) {
        for stored_name in stored_names {
            if let Err(e) = self.storage.delete(stored_name).await {
                tracing::warn!(stored_name = %stored_name, error = %e, "Orphaned attachment file");
            }
        }
    }
}

#[async_trait]
impl<I, Cu, P, Co> InvoiceService for InvoiceServiceImpl<I, Cu, P, Co>
where
    I: InvoiceRepository + 'static,
    Cu: CustomerRepository + 'static,
    P: ProductRepository + 'static,
    Co: CompanyRepository + 'static,
{
    async fn list(
        &self,
        company_id: i64,
        filter: InvoiceFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, InvoiceError> {
        let (items, total) = self.invoice_repo.list(company_id, filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    async fn get(&self, company_id: i64, id: i64) -> Result<InvoiceDetails, InvoiceError> {
        let invoice = self.find(company_id, id).await?;
        self.details(invoice).await
    }

    async fn create(
        &self,
        company_id: i64,
        created_by: i64,
        request: InvoiceRequest,
    ) -> Result<InvoiceDetails, InvoiceError> {
        let id = self.id_generator.generate();
        let prepared = self.prepare(company_id, id, &request).await?;

        let invoice_number = match request
            .invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            Some(number) => number.to_string(),
            None => self.next_number(company_id, prepared.issue_date).await?,
        };

        let now = Utc::now();
        let invoice = Invoice {
            id,
            company_id,
            invoice_number,
            customer: prepared.customer,
            issue_date: prepared.issue_date,
            due_date: request.due_date,
            status: InvoiceStatus::Draft,
            discount: prepared.discount,
            tax_rate_bp: prepared.tax_rate_bp,
            subtotal: prepared.subtotal,
            tax_amount: prepared.tax_amount,
            total: prepared.total,
            notes: request.notes.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        };

        let invoice = self.invoice_repo.create(&invoice, &prepared.items).await?;
        tracing::info!(
            company_id,
            invoice_id = invoice.id,
            number = %invoice.invoice_number,
            total = invoice.total,
            "Invoice created"
        );

        Ok(InvoiceDetails {
            invoice,
            items: prepared.items,
            attachments: Vec::new(),
        })
    }

    async fn update(
        &self,
        company_id: i64,
        id: i64,
        request: InvoiceRequest,
    ) -> Result<InvoiceDetails, InvoiceError> {
        let mut invoice = self.find(company_id, id).await?;
        if !invoice.status.is_editable() {
            return Err(InvoiceError::NotEditable(invoice.status));
        }

        let prepared = self.prepare(company_id, id, &request).await?;

        if let Some(number) = request
            .invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            invoice.invoice_number = number.to_string();
        }
        invoice.customer = prepared.customer;
        invoice.issue_date = prepared.issue_date;
        invoice.due_date = request.due_date;
        invoice.discount = prepared.discount;
        invoice.tax_rate_bp = prepared.tax_rate_bp;
        invoice.subtotal = prepared.subtotal;
        invoice.tax_amount = prepared.tax_amount;
        invoice.total = prepared.total;
        invoice.notes = request.notes.clone();

        let invoice = self.invoice_repo.replace(&invoice, &prepared.items).await?;
        self.details(invoice).await
    }

    async fn change_status(
        &self,
        company_id: i64,
        id: i64,
        status: InvoiceStatus,
    ) -> Result<Invoice, InvoiceError> {
        let invoice = self.find(company_id, id).await?;
        if !invoice.status.can_transition_to(status) {
            return Err(InvoiceError::InvalidTransition {
                from: invoice.status,
                to: status,
            });
        }

        let updated = self
            .invoice_repo
            .update_status(company_id, id, invoice.status, status)
            .await?
            .ok_or(InvoiceError::StatusChanged)?;
        tracing::info!(
            company_id,
            invoice_id = id,
            from = %invoice.status,
            to = %status,
            "Invoice status changed"
        );
        Ok(updated)
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), InvoiceError> {
        let invoice = self.find(company_id, id).await?;
        if !invoice.status.is_editable() {
            return Err(InvoiceError::NotEditable(invoice.status));
        }

        let attachments = self.invoice_repo.attachments(id).await?;
        self.invoice_repo.delete(company_id, id).await?;

        for attachment in attachments {
            if let Err(e) = self.storage.delete(&attachment.stored_name).await {
                tracing::warn!(attachment_id = attachment.id, error = %e, "Orphaned attachment file");
            }
        }
        tracing::info!(company_id, invoice_id = id, "Invoice deleted");
        Ok(())
    }

    async fn document(&self, company_id: i64, id: i64) -> Result<InvoiceDocument, InvoiceError> {
        let invoice = self.find(company_id, id).await?;
        let items = self.invoice_repo.items(id).await?;

        let company = self
            .company_repo
            .find_by_id(company_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Company not found".into()))?;
        let buyer = self.buyer_party(company_id, invoice.customer).await?;

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let products = self.products_for(company_id, &product_ids).await?;
        let totals = totals_for_items(&items, invoice.discount, invoice.tax_rate_bp)?;

        let lines = items
            .iter()
            .zip(&totals.lines)
            .enumerate()
            .map(|(index, (item, amounts))| {
                let product = &products[&item.product_id];
                DocumentLine {
                    row: index + 1,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    description: item.description.clone(),
                    unit: product.unit.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount: item.discount,
                    net: amounts.net,
                }
            })
            .collect();

        Ok(InvoiceDocument {
            invoice_number: invoice.invoice_number,
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            seller: seller_party(&company),
            buyer,
            lines,
            totals,
            currency: self.invoice_settings.currency.clone(),
            notes: invoice.notes,
        })
    }

    async fn render_pdf(&self, company_id: i64, id: i64) -> Result<RenderedPdf, InvoiceError> {
        let document = self.document(company_id, id).await?;
        let bytes = render_invoice_pdf(&document)?;
        Ok(RenderedPdf {
            file_name: pdf_file_name(&document.invoice_number),
            bytes,
        })
    }

    async fn send_email(
        &self,
        company_id: i64,
        id: i64,
        request: SendInvoiceRequest,
    ) -> Result<String, InvoiceError> {
        let document = self.document(company_id, id).await?;

        let to = request
            .to
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| document.buyer.email.clone())
            .ok_or(InvoiceError::NoRecipient)?;

        let bytes = render_invoice_pdf(&document)?;
        let subject = request
            .subject
            .unwrap_or_else(|| format!("Invoice {} from {}", document.invoice_number, document.seller.name));
        let body = request.message.unwrap_or_else(|| {
            format!(
                "Dear {},\n\nPlease find attached invoice {} dated {}.\nTotal: {}.\n\n{}",
                document.buyer.name,
                document.invoice_number,
                document.issue_date_jalali(),
                document.total_in_english_words(),
                document.seller.name
            )
        });

        self.mailer
            .send(OutgoingEmail {
                to: to.clone(),
                subject,
                body,
                attachments: vec![EmailAttachment {
                    filename: pdf_file_name(&document.invoice_number),
                    content_type: "application/pdf".to_string(),
                    data: bytes,
                }],
            })
            .await?;

        tracing::info!(company_id, invoice_id = id, to = %to, "Invoice emailed");
        Ok(to)
    }

    async fn attachments(&self, company_id: i64, id: i64) -> Result<Vec<InvoiceAttachment>, InvoiceError> {
        self.find(company_id, id).await?;
        Ok(self.invoice_repo.attachments(id).await?)
    }

    async fn add_attachments(
        &self,
        company_id: i64,
        id: i64,
        uploaded_by: i64,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<InvoiceAttachment>, InvoiceError> {
        self.find(company_id, id).await?;
        for file in &files {
            self.check_upload(file)?;
        }

        let mut attachments = Vec::with_capacity(files.len());
        let mut stored_names = Vec::with_capacity(files.len());
        for file in files {
            let stored_name = match self.storage.save(&file.file_name, &file.data).await {
                Ok(name) => name,
                Err(e) => {
                    self.discard_files(&stored_names).await;
                    return Err(e.into());
                }
            };
            stored_names.push(stored_name.clone());
            attachments.push(InvoiceAttachment {
                id: self.id_generator.generate(),
                invoice_id: id,
                original_name: file.file_name,
                stored_name,
                content_type: file.content_type,
                size_bytes: file.data.len() as i64,
                uploaded_by,
                created_at: Utc::now(),
            });
        }

        match self.invoice_repo.add_attachments(&attachments).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                self.discard_files(&stored_names).await;
                Err(e.into())
            }
        }
    }

    async fn delete_attachment(
        &self,
        company_id: i64,
        id: i64,
        attachment_id: i64,
    ) -> Result<(), InvoiceError> {
        self.find(company_id, id).await?;
        let attachment = self
            .invoice_repo
            .find_attachment(id, attachment_id)
            .await?
            .ok_or(InvoiceError::AttachmentNotFound)?;

        self.invoice_repo.delete_attachment(id, attachment_id).await?;
        if let Err(e) = self.storage.delete(&attachment.stored_name).await {
            tracing::warn!(attachment_id, error = %e, "Orphaned attachment file");
        }
        Ok(())
    }
}

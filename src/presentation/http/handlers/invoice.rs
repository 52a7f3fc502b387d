//! Invoice Handlers
//!
//! CRUD and status changes, the PDF and print renderings, email delivery and
//! file attachments.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::dto::request::{
    InvoiceQuery, InvoiceRequest, InvoiceStatusRequest, SendInvoiceRequest,
};
use crate::application::dto::response::{AttachmentResponse, InvoiceResponse};
use crate::application::dto::{parse_customer_ref, parse_id};
use crate::application::services::{
    InvoiceDetails, InvoiceService, InvoiceServiceImpl, UploadedFile,
};
use crate::domain::services::PrintView;
use crate::domain::{InvoiceAttachment, InvoiceFilter, InvoiceStatus, Permission};
use crate::infrastructure::repositories::{
    PgCompanyRepository, PgCustomerRepository, PgInvoiceRepository, PgProductRepository,
};
use crate::infrastructure::storage::AttachmentStorage;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Multipart field name carrying uploaded files
const FILE_FIELD: &str = "file";

fn invoice_service(state: &AppState) -> impl InvoiceService {
    InvoiceServiceImpl::new(
        Arc::new(PgInvoiceRepository::new(state.db.clone())),
        Arc::new(PgCustomerRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
        Arc::new(PgCompanyRepository::new(state.db.clone())),
        state.mailer.clone(),
        state.storage.clone(),
        state.snowflake.clone(),
        state.settings.invoice.clone(),
        state.settings.uploads.clone(),
    )
}

fn attachment_responses(
    storage: &AttachmentStorage,
    attachments: Vec<InvoiceAttachment>,
) -> Vec<AttachmentResponse> {
    attachments
        .into_iter()
        .map(|a| {
            let url = storage.url_for(&a.stored_name);
            AttachmentResponse::from_attachment(a, url)
        })
        .collect()
}

fn details_response(storage: &AttachmentStorage, details: InvoiceDetails) -> InvoiceResponse {
    InvoiceResponse::from(details.invoice)
        .with_items(details.items)
        .with_attachments(attachment_responses(storage, details.attachments))
}

fn invoice_filter(query: &InvoiceQuery) -> Result<InvoiceFilter, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            InvoiceStatus::parse(s)
                .ok_or_else(|| AppError::validation(format!("status: unknown status '{}'", s)))
        })
        .transpose()?;

    let customer = match (&query.customer_kind, &query.customer_id) {
        (Some(kind), Some(id)) => Some(parse_customer_ref(kind, id)?),
        (None, None) => None,
        _ => {
            return Err(AppError::validation(
                "customer_kind and customer_id must be given together",
            ))
        }
    };

    Ok(InvoiceFilter {
        status,
        customer,
        search: query.search(),
    })
}

// =============================================================================
// CRUD
// =============================================================================

pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Page<InvoiceResponse>>, AppError> {
    auth.require(Permission::InvoicesRead)?;
    let filter = invoice_filter(&query)?;
    let page = invoice_service(&state)
        .list(auth.company_id, filter, query.page_params())
        .await?;
    Ok(Json(page.map(InvoiceResponse::from)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceResponse>, AppError> {
    auth.require(Permission::InvoicesRead)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let details = invoice_service(&state).get(auth.company_id, id).await?;
    Ok(Json(details_response(&state.storage, details)))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<InvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    auth.require(Permission::InvoicesWrite)?;
    validate(&body)?;
    let details = invoice_service(&state)
        .create(auth.company_id, auth.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(details_response(&state.storage, details))))
}

/// Replace a draft invoice
pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
    Json(body): Json<InvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    auth.require(Permission::InvoicesWrite)?;
    validate(&body)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let details = invoice_service(&state)
        .update(auth.company_id, id, body)
        .await?;
    Ok(Json(details_response(&state.storage, details)))
}

pub async fn change_invoice_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
    Json(body): Json<InvoiceStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    auth.require(Permission::InvoicesWrite)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let invoice = invoice_service(&state)
        .change_status(auth.company_id, id, body.status)
        .await?;
    Ok(Json(invoice.into()))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::InvoicesDelete)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    invoice_service(&state).delete(auth.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Documents & delivery
// =============================================================================

pub async fn invoice_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
) -> Result<Response, AppError> {
    auth.require(Permission::InvoicesRead)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let pdf = invoice_service(&state).render_pdf(auth.company_id, id).await?;

    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", pdf.file_name))
        .map_err(|e| AppError::Internal(format!("Bad PDF file name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        pdf.bytes,
    )
        .into_response())
}

/// Print model in Persian digits with Jalali dates
pub async fn invoice_print(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
) -> Result<Json<PrintView>, AppError> {
    auth.require(Permission::InvoicesRead)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let document = invoice_service(&state).document(auth.company_id, id).await?;
    Ok(Json(document.to_print_view()))
}

#[derive(Debug, Serialize)]
pub struct EmailSentResponse {
    pub sent_to: String,
}

pub async fn email_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
    Json(body): Json<SendInvoiceRequest>,
) -> Result<Json<EmailSentResponse>, AppError> {
    auth.require(Permission::InvoicesSend)?;
    validate(&body)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let sent_to = invoice_service(&state)
        .send_email(auth.company_id, id, body)
        .await?;
    tracing::info!(invoice_id = id, by = auth.user_id, "Invoice emailed");
    Ok(Json(EmailSentResponse { sent_to }))
}

// =============================================================================
// Attachments
// =============================================================================

pub async fn list_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
) -> Result<Json<Vec<AttachmentResponse>>, AppError> {
    auth.require(Permission::InvoicesRead)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let attachments = invoice_service(&state).attachments(auth.company_id, id).await?;
    Ok(Json(attachment_responses(&state.storage, attachments)))
}

/// Upload one or more `file` parts
pub async fn upload_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<AttachmentResponse>>), AppError> {
    auth.require(Permission::InvoicesWrite)?;
    let id = parse_id(&invoice_id, "invoice_id")?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("attachment").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Expected at least one '{}' part",
            FILE_FIELD
        )));
    }

    let attachments = invoice_service(&state)
        .add_attachments(auth.company_id, id, auth.user_id, files)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(attachment_responses(&state.storage, attachments)),
    ))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((invoice_id, attachment_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::InvoicesWrite)?;
    let id = parse_id(&invoice_id, "invoice_id")?;
    let attachment_id = parse_id(&attachment_id, "attachment_id")?;
    invoice_service(&state)
        .delete_attachment(auth.company_id, id, attachment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the request size limit".into())
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CustomerRef;
    use pretty_assertions::assert_eq;

    fn create_test_query(status: Option<&str>, kind: Option<&str>, id: Option<&str>) -> InvoiceQuery {
        InvoiceQuery {
            status: status.map(Into::into),
            customer_kind: kind.map(Into::into),
            customer_id: id.map(Into::into),
            q: Some("  1403 ".into()),
            ..InvoiceQuery::default()
        }
    }

    #[test]
    fn test_filter_from_query() {
        let filter = invoice_filter(&create_test_query(Some("issued"), Some("company"), Some("5"))).unwrap();
        assert_eq!(filter.status, Some(InvoiceStatus::Issued));
        assert_eq!(filter.customer, Some(CustomerRef::company(5)));
        assert_eq!(filter.search.as_deref(), Some("1403"));
    }

    #[test]
    fn test_filter_rejects_unknown_status() {
        let result = invoice_filter(&create_test_query(Some("archived"), None, None));
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_filter_needs_both_customer_fields() {
        let result = invoice_filter(&create_test_query(None, Some("company"), None));
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}

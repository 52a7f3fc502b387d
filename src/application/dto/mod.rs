//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

use crate::domain::{CustomerKind, CustomerRef};
use crate::shared::error::AppError;

/// Parse a string id from a request body or query.
pub fn parse_id(value: &str, field: &str) -> Result<i64, AppError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation(format!("{}: invalid id '{}'", field, value)))
}

pub fn parse_ids(values: &[String], field: &str) -> Result<Vec<i64>, AppError> {
    values.iter().map(|v| parse_id(v, field)).collect()
}

/// Parse a `customer_kind` + `customer_id` pair.
pub fn parse_customer_ref(kind: &str, id: &str) -> Result<CustomerRef, AppError> {
    let kind = CustomerKind::parse(kind).ok_or_else(|| {
        AppError::validation(format!(
            "customer_kind: expected 'individual' or 'company', got '{}'",
            kind
        ))
    })?;
    Ok(CustomerRef {
        kind,
        id: parse_id(id, "customer_id")?,
    })
}

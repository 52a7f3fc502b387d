//! Shared Utilities
//!
//! Errors, validation, paging and id generation used by every layer.

pub mod error;
pub mod pagination;
pub mod snowflake;
pub mod validation;

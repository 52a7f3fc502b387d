//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Rate-limit storage (Redis, optional)
//! - Outgoing mail (SMTP)
//! - Invoice PDF rendering and attachment storage
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod email;
pub mod metrics;
pub mod pdf;
pub mod repositories;
pub mod storage;

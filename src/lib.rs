//! # CRM Server Library
//!
//! This crate provides a multi-tenant CRM backend with:
//! - RESTful HTTP API endpoints for customers, catalog, invoices and chat
//! - PostgreSQL for persistent storage
//! - Redis for distributed rate limiting
//! - SMTP delivery and PDF rendering for invoices
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities, repository traits and formatting rules
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database, cache, mail, PDF and file storage implementations
//! - **Presentation Layer**: HTTP handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! crm_server/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, cache, mail and document implementations
//! +-- presentation/   HTTP routes and middleware
//! +-- shared/         Common utilities (errors, snowflake IDs, paging)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;

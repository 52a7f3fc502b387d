//! Application Layer
//!
//! Use-case services (auth, administration, customers, catalog, invoices,
//! chat, referrals, seeding) and the request/response DTOs the HTTP layer
//! speaks. Services depend on repository traits only.

pub mod dto;
pub mod services;

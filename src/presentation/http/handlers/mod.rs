//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod company;
pub mod customer;
pub mod health;
pub mod invoice;
pub mod referral;
pub mod role;
pub mod user;

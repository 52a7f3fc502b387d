//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **Permission**: Named capability granted to roles
//! - **roles**: Built-in role names and their default grants

mod permissions;

pub use permissions::*;

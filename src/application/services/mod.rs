//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Tenant registration, login, JWT tokens, sessions
//! - **UserService**: Profiles, user administration and role assignment
//! - **RoleService**: Roles and their permission grants
//! - **CompanyService**: The tenant's own company profile
//! - **CustomerService**: Individual and company customers
//! - **CatalogService**: Categories and products
//! - **InvoiceService**: Invoices, PDFs, email delivery and attachments
//! - **ChatService**: Conversations and messages between users
//! - **ReferralService**: Handing customers over to colleagues
//! - **Seeder**: Startup seeding of permissions, roles and the first admin

pub mod auth_service;
pub mod catalog_service;
pub mod chat_service;
pub mod company_service;
pub mod customer_service;
pub mod invoice_service;
pub mod referral_service;
pub mod role_service;
pub mod seed_service;
pub mod user_service;

pub use auth_service::{
    AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims, ClientInfo, Registration,
};
pub use catalog_service::{CatalogService, CatalogServiceImpl};
pub use chat_service::{ChatError, ChatService, ChatServiceImpl};
pub use company_service::{CompanyService, CompanyServiceImpl};
pub use customer_service::{CustomerService, CustomerServiceImpl};
pub use invoice_service::{
    InvoiceDetails, InvoiceError, InvoiceService, InvoiceServiceImpl, RenderedPdf, UploadedFile,
};
pub use referral_service::{ReferralError, ReferralService, ReferralServiceImpl};
pub use role_service::{RoleError, RoleService, RoleServiceImpl, RoleView};
pub use seed_service::{SeedReport, Seeder};
pub use user_service::{UserError, UserService, UserServiceImpl, UserView};

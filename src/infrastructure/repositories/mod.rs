//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! Every tenant-owned query filters on `company_id`, so a row belonging to
//! another tenant is indistinguishable from a missing one.
//!
//! ## Available Repositories
//!
//! - **PgUserRepository** - User accounts and role assignments
//! - **PgSessionRepository** - Refresh-token sessions
//! - **PgCompanyRepository** - Tenant profile and tenant registration
//! - **PgRoleRepository** - Roles, permission catalogue and grants
//! - **PgCustomerRepository** - Individual and company customers with contacts
//! - **PgCategoryRepository** / **PgProductRepository** - Product catalog
//! - **PgInvoiceRepository** - Invoices, items and attachments
//! - **PgChatRepository** - Conversations, messages and read state
//! - **PgReferralRepository** - Customer referrals between users
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgInvoiceRepository, PgUserRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let user_repo = PgUserRepository::new(pool.clone());
//!     let invoice_repo = PgInvoiceRepository::new(pool.clone());
//! }
//! ```

pub mod category_repository;
pub mod chat_repository;
pub mod company_repository;
pub mod customer_repository;
pub mod invoice_repository;
pub mod product_repository;
pub mod referral_repository;
pub mod role_repository;
pub mod session_repository;
pub mod user_repository;

pub use category_repository::PgCategoryRepository;
pub use chat_repository::PgChatRepository;
pub use company_repository::PgCompanyRepository;
pub use customer_repository::PgCustomerRepository;
pub use invoice_repository::PgInvoiceRepository;
pub use product_repository::PgProductRepository;
pub use referral_repository::PgReferralRepository;
pub use role_repository::PgRoleRepository;
pub use session_repository::PgSessionRepository;
pub use user_repository::PgUserRepository;

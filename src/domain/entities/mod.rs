//! # Domain Entities
//!
//! Core business objects of the CRM. All entities map directly to their
//! corresponding database tables.
//!
//! ## Tenancy & Access
//!
//! - **MainCompany**: The tenant; every tenant-owned row references it
//! - **User**: Employee account belonging to one tenant
//! - **Role**: Tenant-owned named bundle of permissions
//! - **Session**: Refresh-token session
//!
//! ## Business Records
//!
//! - **CustomerIndividual / CustomerCompany**: Customers with owned addresses, emails and phones
//! - **Category / Product**: The product catalog
//! - **Invoice**: Invoice header, line items and attachments
//! - **Conversation / ChatMessage**: Internal chat
//! - **UserReferral**: A customer handed over to a colleague
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod catalog;
mod chat;
mod company;
mod customer;
mod invoice;
mod referral;
mod role;
mod session;
mod user;

pub use catalog::{Category, CategoryRepository, Product, ProductFilter, ProductRepository};
pub use chat::{ChatMessage, ChatRepository, Conversation, ConversationSummary, MAX_MESSAGE_LENGTH};
pub use company::{CompanyRepository, MainCompany};
pub use customer::{
    normalize_primary, Address, ContactInfo, ContactPhone, CustomerCompany, CustomerIndividual,
    CustomerKind, CustomerRef, CustomerRepository, EmailAddress, PhoneKind, Primary,
};
pub use invoice::{
    Invoice, InvoiceAttachment, InvoiceFilter, InvoiceItem, InvoiceRepository, InvoiceStatus,
};
pub use referral::{ReferralDirection, ReferralRepository, ReferralStatus, UserReferral};
pub use role::{PermissionRecord, Role, RoleRepository, RoleSeed};
pub use session::{Session, SessionRepository};
pub use user::{User, UserRepository};

#[cfg(test)]
pub use catalog::{MockCategoryRepository, MockProductRepository};
#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use company::MockCompanyRepository;
#[cfg(test)]
pub use customer::MockCustomerRepository;
#[cfg(test)]
pub use invoice::MockInvoiceRepository;
#[cfg(test)]
pub use referral::MockReferralRepository;
#[cfg(test)]
pub use role::MockRoleRepository;
#[cfg(test)]
pub use session::MockSessionRepository;
#[cfg(test)]
pub use user::MockUserRepository;

//! # Domain Services
//!
//! Pure business rules that don't belong to a single entity.
//!
//! ## Services
//!
//! - **invoice_calculator**: Line, discount and tax arithmetic
//! - **invoice_document**: Render-ready invoice model and the Persian print view
//! - **persian**: Persian digits, Jalali calendar, digit grouping
//! - **number_words**: Amounts in Persian and English words

pub mod invoice_calculator;
pub mod invoice_document;
pub mod number_words;
pub mod persian;

pub use invoice_calculator::{calculate_totals, totals_for_items, InvoiceTotals, LineInput, TotalsError};
pub use invoice_document::{DocumentLine, InvoiceDocument, Party, PrintView};

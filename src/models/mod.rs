//! Data models for the BillScan API.
//!
//! These mirror the wire shapes the service produces; amounts stay as
//! decimal strings because rendering is the embedding application's
//! concern.

pub mod invoice;
pub mod user;

pub use invoice::{Invoice, InvoiceFilter, InvoiceStatus};
pub use user::User;

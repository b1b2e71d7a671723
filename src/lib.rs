//! Client library for the BillScan invoice extraction service.
//!
//! BillScan lets users upload invoice and utility-bill documents, poll
//! their extraction status, and read back structured fields. This crate
//! is the service-facing half of that application: an authenticated HTTP
//! client with single-flight token refresh, a session lifecycle manager,
//! and typed models for the invoice and user resources.
//!
//! The access token is held in process memory only. Token renewal rides
//! an http-only cookie, so the library never sees the refresh credential
//! itself.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{RefreshCoordinator, SessionManager, TokenStore};
pub use config::Config;
pub use models::{Invoice, InvoiceFilter, InvoiceStatus, User};

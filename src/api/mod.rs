//! HTTP client module for the BillScan service.
//!
//! This module provides the `ApiClient` for communicating with the
//! BillScan API: authentication, the user profile, and the invoice
//! resource (list, upload, reprocess, delete).
//!
//! Requests carry a JWT bearer token; on a 401 the client refreshes the
//! token once (single-flight across concurrent requests) and replays.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

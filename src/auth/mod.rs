//! Authentication module for credential storage, token refresh and the
//! session lifecycle.
//!
//! This module provides:
//! - `TokenStore`: the in-memory access token shared by client and session
//! - `RefreshCoordinator`: single-flight token refresh with a waiter queue
//! - `SessionManager`: login/logout/registration plus a proactive refresh
//!   timer

pub mod refresh;
pub mod session;
pub mod store;

pub use refresh::RefreshCoordinator;
pub use session::SessionManager;
pub use store::TokenStore;

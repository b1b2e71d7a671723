//! In-memory access token storage.
//!
//! The token is an opaque bearer string; it is never validated or
//! persisted here. `TokenStore` is a cheap clonable handle, so the
//! client, the refresh coordinator and the session manager all observe
//! the same value with no staleness window.

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Inner {
    token: Option<String>,
    /// Bumped on every mutation. A refresh that started before a
    /// `clear()` (logout) uses this to detect that its token is stale.
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Inner>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current access token, if any.
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Replace the stored token. Visible to all subsequent `get` calls.
    pub fn set(&self, token: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.token = Some(token.into());
        inner.epoch += 1;
    }

    /// Drop the stored token (logout or unrecoverable refresh failure).
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.token = None;
        inner.epoch += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_none()
    }

    /// Epoch observed before starting a refresh.
    pub(crate) fn epoch(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch
    }

    /// Store `token` only if no other mutation happened since `observed`
    /// was read. Returns whether the token was stored. Keeps a logout
    /// that raced an in-flight refresh from being resurrected.
    pub(crate) fn set_if_epoch(&self, token: &str, observed: u64) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch != observed {
            return false;
        }
        inner.token = Some(token.to_string());
        inner.epoch += 1;
        true
    }
}

//! Session lifecycle management.
//!
//! `SessionManager` owns the human-facing authentication flow: login,
//! registration, logout and the startup session check. Views observe only
//! `current_user()` / `is_authenticated()`. A proactive refresh timer
//! renews the access token before it expires so an idle session never
//! hits a 401; the timer is an abortable task that dies with the manager.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::User;

pub struct SessionManager {
    client: Arc<ApiClient>,
    user: RwLock<Option<User>>,
    refresh_interval: Duration,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(client: Arc<ApiClient>, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            client,
            user: RwLock::new(None),
            refresh_interval: config.refresh_interval,
            refresh_task: Mutex::new(None),
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The authenticated user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_user(&self, user: Option<User>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Drop all local authentication state. Never touches the network.
    fn clear_local(&self) {
        self.set_user(None);
        self.client.token_store().clear();
    }

    /// Authenticate and populate the session from the profile endpoint.
    ///
    /// On any failure the session is left cleared and the error goes to
    /// the caller; displaying it is the view's concern.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let result: Result<(), ApiError> = async {
            self.client.obtain_token(username, password).await?;
            let user = self.client.fetch_profile().await?;
            info!(username = %user.username, "login succeeded");
            self.set_user(Some(user));
            Ok(())
        }
        .await;

        if result.is_err() {
            self.clear_local();
        }
        result
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        self.client.register(username, email, password).await?;
        self.login(username, password).await
    }

    /// End the session. The server call is best-effort; local state is
    /// cleared no matter what, so logout always succeeds for the caller.
    pub async fn logout(&self) {
        if let Err(err) = self.client.post_logout().await {
            warn!(error = %err, "server logout failed; clearing local session anyway");
        }
        self.clear_local();
    }

    /// Startup session check: try to restore authentication through the
    /// refresh cookie. Returns whether a session was established; a
    /// failure is "not logged in", not an error.
    pub async fn check_session(&self) -> bool {
        match self.client.fetch_profile().await {
            Ok(user) => {
                info!(username = %user.username, "restored existing session");
                self.set_user(Some(user));
                true
            }
            Err(err) => {
                debug!(error = %err, "session check failed; treating as unauthenticated");
                self.clear_local();
                false
            }
        }
    }

    /// Start the proactive refresh timer. Replaces (and cancels) any
    /// previous timer. The task holds only a weak reference, so it can
    /// never keep a dropped manager alive.
    pub fn spawn_refresh_task(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        let interval = self.refresh_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; the token was just issued.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !Self::proactive_refresh(&manager).await {
                    break;
                }
            }
        });

        let mut slot = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// One timer tick. Returns false when the manager is gone and the
    /// task should stop.
    async fn proactive_refresh(manager: &Weak<Self>) -> bool {
        let Some(manager) = manager.upgrade() else {
            return false;
        };
        if !manager.is_authenticated() {
            // Nothing to keep alive; wait for the next login.
            return true;
        }
        match manager.client.refresh_access_token().await {
            Ok(_) => debug!("proactive token refresh succeeded"),
            Err(err) => {
                warn!(error = %err, "proactive token refresh failed; clearing session");
                manager.clear_local();
            }
        }
        true
    }

    /// Cancel the proactive refresh timer.
    pub fn shutdown(&self) {
        let mut slot = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let slot = match self.refresh_task.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

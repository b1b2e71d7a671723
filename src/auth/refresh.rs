//! Single-flight token refresh coordination.
//!
//! Any number of tasks can hit an expired-credential 401 in the same
//! window; exactly one of them performs the network refresh while the
//! rest queue behind it. When the refresh settles, every queued waiter is
//! resolved with the new token or rejected with the one shared error,
//! and the coordinator returns to idle so a later 401 can start a fresh
//! attempt. One failure never locks the coordinator out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::TokenStore;

type Waiter = oneshot::Sender<Result<String, ApiError>>;

enum State {
    Idle,
    /// A refresh is in flight; entries are drained FIFO on settlement.
    Refreshing(Vec<Waiter>),
}

pub struct RefreshCoordinator {
    tokens: TokenStore,
    state: Mutex<State>,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(tokens: TokenStore, timeout: Duration) -> Self {
        Self {
            tokens,
            state: Mutex::new(State::Idle),
            timeout,
        }
    }

    /// Obtain a fresh access token, performing the refresh operation `op`
    /// or joining one already in flight.
    ///
    /// On success the token store is updated once for the whole cycle and
    /// every caller receives the new token. On failure (including
    /// timeout) the store is cleared and every caller receives the same
    /// error.
    pub async fn run<F, Fut>(&self, op: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        // Enqueue-or-lead must happen atomically between suspension
        // points, so the lock is released before any await on the
        // network.
        {
            let mut state = self.state.lock().await;
            if let State::Refreshing(waiters) = &mut *state {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                drop(state);
                debug!("refresh already in flight; waiting for its outcome");
                return match rx.await {
                    Ok(outcome) => outcome,
                    // The leader never drops the queue without settling
                    // it; treat a lost sender as a failed refresh anyway.
                    Err(_) => Err(ApiError::RefreshFailed(Arc::new(
                        ApiError::InvalidResponse("refresh settled without a result".into()),
                    ))),
                };
            }
            *state = State::Refreshing(Vec::new());
        }

        let epoch = self.tokens.epoch();
        let outcome = match tokio::time::timeout(self.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::RefreshTimedOut(self.timeout)),
        };

        // Return to idle and take the queue in one step, so any trigger
        // arriving from here on starts a new refresh instead of joining a
        // settled one.
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing(waiters) => waiters,
                State::Idle => Vec::new(),
            }
        };

        match outcome {
            Ok(token) => {
                if !self.tokens.set_if_epoch(&token, epoch) {
                    // Logout (or a new login) won the race; the refreshed
                    // token must not resurrect the cleared credential.
                    debug!("credential store changed during refresh; discarding refreshed token");
                }
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; failing queued requests");
                self.tokens.clear();
                let shared = Arc::new(err);
                for waiter in waiters {
                    let _ = waiter.send(Err(ApiError::RefreshFailed(Arc::clone(&shared))));
                }
                Err(ApiError::RefreshFailed(shared))
            }
        }
    }
}

//! Authenticated API client for the BillScan service.
//!
//! Every request goes through `send_with_auth`, which attaches the
//! current bearer token, detects an expired-credential 401, obtains a
//! fresh token through the refresh coordinator (performing the refresh
//! or joining one already in flight) and replays the request exactly
//! once. The token refresh call itself bypasses that wrapper: it is
//! authenticated by an http-only cookie the service set at login, never
//! by the bearer token it is trying to replace.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::config::Config;
use crate::models::{Invoice, InvoiceFilter, User};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Largest accepted upload, matching the service-side limit.
/// Rejecting locally saves a doomed round trip for oversized documents.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field name the service expects the document under.
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: TokenStore,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    /// Create a new API client. The cookie store holds the http-only
    /// refresh credential across calls.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()?;

        let tokens = TokenStore::new();
        let refresher = RefreshCoordinator::new(tokens.clone(), config.refresh_timeout);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            refresher,
        })
    }

    /// Shared handle to the access token store.
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Interceptor =====

    /// Dispatch a request with the current bearer token attached,
    /// refreshing and replaying once on a 401.
    ///
    /// `make` rebuilds the request for the replay (a dispatched request
    /// is consumed, and multipart bodies cannot be cloned). The replayed
    /// response is final: a second 401 surfaces to the caller unchanged.
    async fn send_with_auth<F>(&self, make: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut request = make();
        if let Some(token) = self.tokens.get() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("request returned 401; refreshing access token before one retry");
        let token = self.refresh_access_token().await?;
        let response = make().bearer_auth(token).send().await?;
        Ok(response)
    }

    /// Refresh the access token, collapsing concurrent triggers into a
    /// single network call.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        self.refresher.run(|| self.request_refresh()).await
    }

    /// The actual refresh call. Only ever executed by the coordinator's
    /// leader, one at a time.
    async fn request_refresh(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.url("/api/token/refresh/"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let body: TokenResponse = response.json().await?;
        Ok(body.access)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_with_auth(|| self.http.get(&url)).await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .send_with_auth(|| self.http.post(&url).json(body))
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    // ===== Authentication endpoints =====

    /// Exchange credentials for an access token and store it.
    pub async fn obtain_token(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.url("/api/token/"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let body: TokenResponse = response.json().await?;
        self.tokens.set(&body.access);
        Ok(body.access)
    }

    /// Create a new account. Does not log in; callers chain `obtain_token`
    /// (the session manager does this automatically).
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/register/");
        let body = serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        });
        let response = self.send_with_auth(|| self.http.post(&url).json(&body)).await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Ask the service to invalidate the session. The caller decides how
    /// much to care about failures; local state is not touched here.
    pub async fn post_logout(&self) -> Result<(), ApiError> {
        let url = self.url("/api/logout/");
        let response = self
            .send_with_auth(|| self.http.post(&url).json(&serde_json::json!({})))
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Fetch the authenticated user's identity.
    pub async fn fetch_profile(&self) -> Result<User, ApiError> {
        self.get_json("/api/profile/").await
    }

    // ===== Invoice endpoints =====

    /// List the user's invoices, optionally filtered by status and date.
    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ApiError> {
        let url = self.url("/api/invoices/");
        let query = filter.to_query();
        let response = self
            .send_with_auth(|| self.http.get(&url).query(&query))
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch a single invoice with its extraction fields.
    pub async fn fetch_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
        self.get_json(&format!("/api/invoices/{}/", id)).await
    }

    /// Upload a document for extraction. Processing starts server-side;
    /// the returned invoice is typically still `pending`.
    pub async fn upload_invoice(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Invoice, ApiError> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::Validation(format!(
                "file is {} bytes; the service accepts at most {} bytes",
                bytes.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        let url = self.url("/api/invoices/");
        let response = self
            .send_with_auth(|| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.to_string());
                let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);
                self.http.post(&url).multipart(form)
            })
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Re-run extraction on a failed invoice. The service rejects
    /// reprocessing of invoices in any other state with a 400.
    pub async fn reprocess_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
        self.post_json(
            &format!("/api/invoices/{}/reprocess/", id),
            &serde_json::json!({}),
        )
        .await
    }

    /// Delete an invoice (the service soft-deletes it).
    pub async fn delete_invoice(&self, id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/invoices/{}/", id));
        let response = self.send_with_auth(|| self.http.delete(&url)).await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

//! In-process mock of the BillScan service for integration tests.
//!
//! Issues "T1" at login and "T2" from the refresh endpoint; protected
//! routes accept whatever the current valid token is and record the
//! Authorization headers they see.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const LOGIN_TOKEN: &str = "T1";
pub const REFRESHED_TOKEN: &str = "T2";

#[derive(Default)]
pub struct ServerState {
    /// Token currently accepted by protected routes.
    pub valid_token: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay_ms: AtomicUsize,
    pub refresh_fails: AtomicBool,
    /// When set, the invoice list route 401s regardless of the token.
    pub reject_all_invoices: AtomicBool,
    pub invoice_hits: AtomicUsize,
    /// Authorization header of every invoice-list request, in order.
    pub invoice_auth_headers: Mutex<Vec<String>>,
    pub register_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<ServerState>,
}

impl MockApi {
    pub async fn spawn() -> Self {
        let state = Arc::new(ServerState::default());

        let app = Router::new()
            .route("/api/token/", post(obtain_token))
            .route("/api/token/refresh/", post(refresh_token))
            .route("/api/register/", post(register))
            .route("/api/logout/", post(logout))
            .route("/api/profile/", get(profile))
            .route("/api/invoices/", get(list_invoices).post(upload_invoice))
            .route("/api/invoices/:id/reprocess/", post(reprocess_invoice))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr: SocketAddr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server died");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Make protected routes require the refreshed token, so requests
    /// carrying the login token get a 401 first.
    pub fn expire_login_token(&self) {
        *self
            .state
            .valid_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = REFRESHED_TOKEN.to_string();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn fail_refreshes(&self) {
        self.state.refresh_fails.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn invoice_hits(&self) -> usize {
        self.state.invoice_hits.load(Ordering::SeqCst)
    }

    pub fn invoice_auth_headers(&self) -> Vec<String> {
        self.state
            .invoice_auth_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn authorized(state: &ServerState, headers: &HeaderMap) -> bool {
    let expected = format!(
        "Bearer {}",
        state
            .valid_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    );
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

pub fn invoice_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "user": {"id": 1, "username": "alice", "email": "a@x.com"},
        "file_url": format!("http://localhost:8000/media/invoices/bill-{id}.pdf"),
        "file_size": 48211,
        "file_type": "pdf",
        "uploaded_at": "2025-06-01T10:30:00Z",
        "invoice_date": "2025-05-28",
        "invoice_number": format!("INV-{id}-20250601"),
        "amount": "142.50",
        "due_date": "2025-06-28",
        "status": status,
        "error_message": null
    })
}

async fn obtain_token(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Response {
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if password == "wrong" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }
    *state
        .valid_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = LOGIN_TOKEN.to_string();
    Json(json!({"access": LOGIN_TOKEN, "refresh": "R1"})).into_response()
}

async fn refresh_token(State(state): State<Arc<ServerState>>) -> Response {
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
    }
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if state.refresh_fails.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Refresh token expired"})),
        )
            .into_response();
    }

    *state
        .valid_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = REFRESHED_TOKEN.to_string();
    Json(json!({"access": REFRESHED_TOKEN})).into_response()
}

async fn register(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Response {
    state.register_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(json!({
            "username": body.get("username").cloned().unwrap_or_default(),
            "email": body.get("email").cloned().unwrap_or_default(),
        })),
    )
        .into_response()
}

async fn logout(State(state): State<Arc<ServerState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"detail": "logged out"})).into_response()
}

async fn profile(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({"id": 1, "username": "alice", "email": "a@x.com"})).into_response()
}

async fn list_invoices(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.invoice_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        state
            .invoice_auth_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.to_string());
    }

    if state.reject_all_invoices.load(Ordering::SeqCst) || !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!([invoice_json(7, "completed")])).into_response()
}

async fn upload_invoice(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    (StatusCode::CREATED, Json(invoice_json(8, "pending"))).into_response()
}

async fn reprocess_invoice(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(invoice_json(id, "processing")).into_response()
}

//! Library configuration.
//!
//! All settings are read from the environment (optionally via a `.env`
//! file) so the embedding application controls where the BillScan service
//! lives without this crate growing a config-file format.

use std::time::Duration;

use tracing::warn;

/// Default base URL of the BillScan API service.
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow extraction-status responses while failing fast
/// enough for an interactive caller.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single token refresh call, in seconds.
/// A hung refresh would otherwise stall every request queued behind it.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

/// Proactive token refresh interval in seconds (15 minutes).
/// Keeps an idle session from ever hitting an expired-credential 401.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the BillScan API, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
    /// Timeout applied to the token refresh call itself.
    pub refresh_timeout: Duration,
    /// Interval of the session manager's proactive refresh timer.
    pub refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `BILLSCAN_API_URL`,
    /// `BILLSCAN_REQUEST_TIMEOUT_SECS`, `BILLSCAN_REFRESH_TIMEOUT_SECS`,
    /// `BILLSCAN_REFRESH_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("BILLSCAN_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = read_secs("BILLSCAN_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs("BILLSCAN_REFRESH_TIMEOUT_SECS") {
            config.refresh_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs("BILLSCAN_REFRESH_INTERVAL_SECS") {
            config.refresh_interval = Duration::from_secs(secs);
        }

        config
    }

    /// Config pointing at the given base URL with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

fn read_secs(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!(var, value = %raw, "ignoring unparsable duration setting");
            None
        }
    }
}

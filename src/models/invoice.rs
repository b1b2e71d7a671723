use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Extraction state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl InvoiceStatus {
    /// Wire form used in query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Failed => "failed",
        }
    }
}

/// An uploaded invoice document plus whatever fields extraction has
/// produced so far. Extraction fields stay unset until processing
/// completes; `amount` is a decimal string as serialized by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub user: User,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Invoice {
    pub fn is_failed(&self) -> bool {
        self.status == InvoiceStatus::Failed
    }
}

/// Server-side list filters supported by `GET /api/invoices/`.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub date: Option<NaiveDate>,
}

impl InvoiceFilter {
    /// Query pairs for the list endpoint; empty when unfiltered.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(date) = self.date {
            query.push(("date", date.format("%Y-%m-%d").to_string()));
        }
        query
    }
}

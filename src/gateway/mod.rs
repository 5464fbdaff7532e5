//! Remote invoice gateway boundary.
//!
//! The core consumes list/detail/delete/status/upload operations through the
//! dyn-compatible [`InvoiceGateway`] trait; everything behind it (transport,
//! storage, OCR, duplicate scoring) is the backend's business. `http` is the
//! production REST implementation; `mock` is the scriptable test double.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::types::{
    CrossUserDuplicateInfo, DuplicateInfo, InvoiceRecord, InvoiceStatus, ListQuery, UploadMetadata,
};

/// One page of invoices as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult {
    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,
    #[serde(default)]
    pub total: u64,
    /// Advisory; the store recomputes its own `has_more` from the counters.
    #[serde(default)]
    pub has_more: bool,
}

/// A single-file upload request as the gateway consumes it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_path: String,
    pub file_name: String,
    /// Raw file bytes (invoice PDFs/images are small enough to buffer).
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`; the backend uses it for duplicate detection.
    pub sha256: String,
    /// Client-generated key so the backend can drop an accidental resend of
    /// the same attempt.
    pub idempotency_key: String,
    pub metadata: UploadMetadata,
}

/// Terminal outcome of the backend's upload-and-OCR endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_info: Option<DuplicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_user_duplicate_info: Option<CrossUserDuplicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadOutcomeError>,
}

/// Error detail inside an upload outcome (backend-supplied message).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcomeError {
    #[serde(default)]
    pub message: String,
}

/// The remote service boundary the sync core reconciles against.
///
/// All methods are one-shot calls; the core serializes them through its
/// mailbox, so implementations never see concurrent invocations from the same
/// session.
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    /// Paged list query. Filters and sort are passed through unmodified.
    async fn list_invoices(&self, query: &ListQuery) -> Result<PagedResult, GatewayError>;

    /// Fetch one invoice by id, with the full error taxonomy.
    async fn fetch_detail(&self, id: &str) -> Result<InvoiceRecord, GatewayError>;

    /// Delete one invoice.
    async fn delete_invoice(&self, id: &str) -> Result<(), GatewayError>;

    /// Delete several invoices in one aggregated call.
    async fn delete_invoices(&self, ids: &[String]) -> Result<(), GatewayError>;

    /// Update the reimbursement status of one invoice.
    async fn update_status(&self, id: &str, status: InvoiceStatus) -> Result<(), GatewayError>;

    /// Upload one file and run remote OCR/extraction on it.
    ///
    /// Atomic from the caller's perspective: there is no incremental progress
    /// channel, and cancellation is not supported by this contract.
    async fn upload_invoice(&self, request: UploadRequest) -> Result<UploadOutcome, GatewayError>;
}

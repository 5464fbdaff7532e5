use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single invoice record as held in the local window.
///
/// Owned by the list store; the UI layer only ever sees clones inside emitted
/// snapshots. Mutation goes through the coordinator, never through the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    /// Opaque stable key assigned by the backend.
    pub id: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub total_amount: BigDecimal,
    pub seller_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    /// Issue date as printed on the invoice (backend-formatted string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    /// Opaque pointer to the stored file (bucket key or URL, backend's choice).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Reimbursement lifecycle of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unreimbursed,
    Pending,
    Reimbursed,
    Voided,
}

impl InvoiceStatus {
    /// Parse the lowercase wire form (also accepted from the CLI).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unreimbursed" => Some(Self::Unreimbursed),
            "pending" => Some(Self::Pending),
            "reimbursed" => Some(Self::Reimbursed),
            "voided" => Some(Self::Voided),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreimbursed => "unreimbursed",
            Self::Pending => "pending",
            Self::Reimbursed => "reimbursed",
            Self::Voided => "voided",
        }
    }
}

/// Opaque filter criteria, passed through to the gateway unmodified.
///
/// The core never interprets filter semantics; it only caches the last-applied
/// set so refresh and load-more replay the same query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters(pub serde_json::Map<String, serde_json::Value>);

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Filter entries as query-parameter pairs (values stringified).
    pub fn as_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// One paged list query as the gateway consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
    /// Opaque sort spec (e.g. "invoiceDate:desc"), passed through unmodified.
    pub sort: Option<String>,
}

/// Pagination counters for the in-memory window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub has_more: bool,
    pub is_loading_more: bool,
}

impl PaginationState {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 0,
            page_size,
            total_count: 0,
            has_more: false,
            is_loading_more: false,
        }
    }

    /// Recompute `has_more` from the committed counters.
    ///
    /// Invariant: `has_more == (current_page * page_size) < total_count` after
    /// every successful page load. The server's own `hasMore` flag is advisory.
    pub fn recompute_has_more(&mut self) {
        self.has_more =
            (self.current_page as u64).saturating_mul(self.page_size as u64) < self.total_count;
    }
}

// =============================================================================
// Upload pipeline types
// =============================================================================

/// Named point in a per-file upload's monotonic progress state machine.
///
/// The first four stages are synthesized locally before the single blocking
/// gateway call; their progress fractions are advisory UI feedback, not a
/// measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    Preparing,
    Hashing,
    Uploading,
    Processing,
    Success,
    Duplicate,
    Error,
}

impl UploadStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Duplicate | Self::Error)
    }

    /// Fixed advisory fraction for this stage (illustrative only).
    pub fn progress_fraction(&self) -> f32 {
        match self {
            Self::Preparing => 0.0,
            Self::Hashing => 0.2,
            Self::Uploading => 0.5,
            Self::Processing => 0.8,
            Self::Success | Self::Duplicate | Self::Error => 1.0,
        }
    }
}

/// Observable progress of one file moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_path: String,
    pub file_name: String,
    pub stage: UploadStage,
    /// 0.0–1.0, advisory only.
    pub progress: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            file_name: file_name_of(file_path),
            stage: UploadStage::Preparing,
            progress: UploadStage::Preparing.progress_fraction(),
            message: None,
            error: None,
        }
    }
}

/// Caller-supplied metadata attached to an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Where the file came from ("manual", "email-scan", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Duplicate match within the uploading user's own records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_invoice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Content match against a record owned by a different account.
///
/// Surfaced with score and recommendations, never auto-resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossUserDuplicateInfo {
    pub invoice_number: String,
    pub original_owner_ref: String,
    pub original_upload_time: DateTime<Utc>,
    pub similarity_score: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Terminal outcome of one file's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_path: String,
    pub file_name: String,
    pub is_success: bool,
    pub is_duplicate: bool,
    /// Present iff success and not duplicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_info: Option<DuplicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_user_duplicate_info: Option<CrossUserDuplicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl UploadResult {
    pub fn success(file_path: &str, invoice: InvoiceRecord) -> Self {
        Self {
            is_success: true,
            invoice: Some(invoice),
            ..Self::bare(file_path)
        }
    }

    pub fn duplicate(
        file_path: &str,
        duplicate_info: Option<DuplicateInfo>,
        cross_user: Option<CrossUserDuplicateInfo>,
    ) -> Self {
        Self {
            is_duplicate: true,
            duplicate_info,
            cross_user_duplicate_info: cross_user,
            ..Self::bare(file_path)
        }
    }

    pub fn failure(file_path: &str, message: String, code: &str) -> Self {
        Self {
            error: Some(ErrorInfo {
                message,
                code: code.to_string(),
            }),
            ..Self::bare(file_path)
        }
    }

    fn bare(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            file_name: file_name_of(file_path),
            is_success: false,
            is_duplicate: false,
            invoice: None,
            duplicate_info: None,
            cross_user_duplicate_info: None,
            error: None,
        }
    }
}

/// Serializable `{message, code}` error payload for emitted states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    pub code: String,
}

/// Explicit per-session identity, passed into the core at construction.
///
/// There are no process-wide caches keyed implicitly by "current user": every
/// actor instance owns its state and carries this context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Opaque account reference the backend scopes queries by.
    pub account_ref: String,
}

impl SessionContext {
    pub fn new(account_ref: impl Into<String>) -> Self {
        Self {
            account_ref: account_ref.into(),
        }
    }
}

fn file_name_of(file_path: &str) -> String {
    std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ordering_is_monotonic() {
        assert!(UploadStage::Preparing < UploadStage::Hashing);
        assert!(UploadStage::Hashing < UploadStage::Uploading);
        assert!(UploadStage::Uploading < UploadStage::Processing);
        assert!(UploadStage::Processing < UploadStage::Success);
        assert!(!UploadStage::Processing.is_terminal());
        assert!(UploadStage::Duplicate.is_terminal());
    }

    #[test]
    fn has_more_invariant_holds() {
        let mut p = PaginationState::new(20);
        p.current_page = 1;
        p.total_count = 57;
        p.recompute_has_more();
        assert!(p.has_more);

        p.current_page = 3;
        p.recompute_has_more();
        assert!(!p.has_more, "3 * 20 >= 57");
    }

    #[test]
    fn filters_pass_through_as_query_pairs() {
        let mut map = serde_json::Map::new();
        map.insert("status".into(), serde_json::json!("unreimbursed"));
        map.insert("minAmount".into(), serde_json::json!(100));
        let filters = Filters(map);

        let pairs = filters.as_query_pairs();
        assert!(pairs.contains(&("status".to_string(), "unreimbursed".to_string())));
        assert!(pairs.contains(&("minAmount".to_string(), "100".to_string())));
    }

    #[test]
    fn invoice_record_round_trips_camel_case() {
        let json = serde_json::json!({
            "id": "inv-1",
            "invoiceNumber": "2026-0001",
            "status": "pending",
            "totalAmount": "1234.50",
            "sellerName": "Acme Supplies",
        });
        let record: InvoiceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.status, InvoiceStatus::Pending);
        assert_eq!(record.seller_name, "Acme Supplies");
        assert!(record.file_ref.is_none());

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["invoiceNumber"], "2026-0001");
    }

    #[test]
    fn upload_result_constructors_are_exclusive() {
        let dup = UploadResult::duplicate("/tmp/a.pdf", Some(DuplicateInfo::default()), None);
        assert!(!dup.is_success);
        assert!(dup.is_duplicate);
        assert!(dup.invoice.is_none());

        let fail = UploadResult::failure("/tmp/a.pdf", "boom".into(), "SERVER_ERROR");
        assert!(!fail.is_success && !fail.is_duplicate);
        assert_eq!(fail.error.as_ref().unwrap().code, "SERVER_ERROR");
        assert_eq!(fail.file_name, "a.pdf");
    }
}

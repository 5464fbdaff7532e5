//! Intents, states, and notifications flowing through the core.
//!
//! Two independently-observable output channels:
//! - a durable state stream ([`CoreState`]): exactly one active state at a
//!   time, emitted in operation-completion order;
//! - a transient notification stream ([`Notification`]): one-shot
//!   confirmations (toasts) that never displace the durable state.
//!
//! Keeping the channels separate makes ordering structural; there is no
//! sleep-before-emit anywhere in the core.

use serde::Serialize;

use crate::types::{
    Filters, InvoiceRecord, InvoiceStatus, UploadMetadata, UploadProgress, UploadResult,
};

/// An intent enqueued into the actor's mailbox.
///
/// Intents are processed strictly FIFO, each to completion (including any
/// awaited gateway call) before the next begins.
#[derive(Debug)]
pub enum CoreEvent {
    LoadPage {
        page: u32,
        page_size: u32,
        filters: Filters,
        sort: Option<String>,
        refresh: bool,
    },
    LoadMore,
    Refresh,
    DeleteOne {
        id: String,
    },
    DeleteBatch {
        ids: Vec<String>,
    },
    UpdateStatus {
        id: String,
        status: InvoiceStatus,
    },
    Upload {
        path: String,
        metadata: UploadMetadata,
    },
    UploadBatch {
        paths: Vec<String>,
        metadata: UploadMetadata,
    },
    /// Independent resubmission of a single file, subject to the
    /// in-flight guard.
    RetryUpload {
        path: String,
        metadata: UploadMetadata,
    },
    /// Clears local upload tracking; never aborts an in-flight gateway call.
    CancelUploads,
    GetDetail {
        id: String,
    },
}

/// Durable state exposed to the UI layer; one active state at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CoreState {
    Initial,
    Loading,
    #[serde(rename_all = "camelCase")]
    Loaded {
        records: Vec<InvoiceRecord>,
        page: u32,
        total: u64,
        has_more: bool,
        is_loading_more: bool,
    },
    DetailLoading,
    #[serde(rename_all = "camelCase")]
    DetailLoaded {
        record: InvoiceRecord,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    Uploading {
        progresses: Vec<UploadProgress>,
        completed: usize,
        total: usize,
    },
    #[serde(rename_all = "camelCase")]
    UploadCompleted {
        results: Vec<UploadResult>,
        success_count: usize,
        failure_count: usize,
        duplicate_count: usize,
    },
}

/// Transient, one-shot confirmations for the notification stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    DeleteSucceeded { message: String },
    #[serde(rename_all = "camelCase")]
    StatusUpdated {
        id: String,
        status: InvoiceStatus,
    },
    #[serde(rename_all = "camelCase")]
    UploadsCancelled,
}

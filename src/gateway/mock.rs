//! Scriptable in-memory gateway for tests.
//!
//! Each operation pops its next scripted result from a queue and bumps a call
//! counter, so tests can pin both behavior ("the delete failed") and traffic
//! ("the cache hit issued zero fetches").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::error::GatewayError;
use crate::types::{InvoiceRecord, InvoiceStatus, ListQuery};

use super::{InvoiceGateway, PagedResult, UploadOutcome, UploadRequest};

#[derive(Default)]
pub struct MockGateway {
    list_results: Mutex<VecDeque<Result<PagedResult, GatewayError>>>,
    detail_results: Mutex<VecDeque<Result<InvoiceRecord, GatewayError>>>,
    delete_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    batch_delete_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    status_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    upload_results: Mutex<VecDeque<Result<UploadOutcome, GatewayError>>>,

    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub batch_delete_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,

    /// `(file_name, sha256)` of every upload request received.
    pub uploaded: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_list(&self, result: Result<PagedResult, GatewayError>) {
        self.list_results.lock().unwrap().push_back(result);
    }

    pub fn push_detail(&self, result: Result<InvoiceRecord, GatewayError>) {
        self.detail_results.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), GatewayError>) {
        self.delete_results.lock().unwrap().push_back(result);
    }

    pub fn push_batch_delete(&self, result: Result<(), GatewayError>) {
        self.batch_delete_results.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<(), GatewayError>) {
        self.status_results.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: Result<UploadOutcome, GatewayError>) {
        self.upload_results.lock().unwrap().push_back(result);
    }
}

/// A page of `count` sequential fixture invoices starting at `start`.
pub fn page_of(start: usize, count: usize, total: u64) -> PagedResult {
    let invoices = (start..start + count).map(|n| invoice(&format!("inv-{n}"))).collect();
    PagedResult {
        invoices,
        total,
        has_more: false,
    }
}

/// Minimal fixture record.
pub fn invoice(id: &str) -> InvoiceRecord {
    InvoiceRecord {
        id: id.to_string(),
        invoice_number: format!("N-{id}"),
        status: InvoiceStatus::Unreimbursed,
        total_amount: BigDecimal::from(100),
        seller_name: "Acme Supplies".to_string(),
        buyer_name: None,
        invoice_date: None,
        file_ref: None,
        uploaded_at: None,
    }
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, GatewayError>>>, fallback: T) -> Result<T, GatewayError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Ok(fallback))
}

#[async_trait]
impl InvoiceGateway for MockGateway {
    async fn list_invoices(&self, _query: &ListQuery) -> Result<PagedResult, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.list_results, PagedResult::default())
    }

    async fn fetch_detail(&self, id: &str) -> Result<InvoiceRecord, GatewayError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::NotFound(id.to_string())))
    }

    async fn delete_invoice(&self, _id: &str) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.delete_results, ())
    }

    async fn delete_invoices(&self, _ids: &[String]) -> Result<(), GatewayError> {
        self.batch_delete_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.batch_delete_results, ())
    }

    async fn update_status(&self, _id: &str, _status: InvoiceStatus) -> Result<(), GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.status_results, ())
    }

    async fn upload_invoice(&self, request: UploadRequest) -> Result<UploadOutcome, GatewayError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded
            .lock()
            .unwrap()
            .push((request.file_name.clone(), request.sha256.clone()));
        let fallback = UploadOutcome {
            is_success: true,
            invoice: Some(invoice(&format!("up-{}", request.file_name))),
            ..UploadOutcome::default()
        };
        pop(&self.upload_results, fallback)
    }
}

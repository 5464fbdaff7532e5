//! Single-consumer event mailbox for the sync core.
//!
//! Every external intent is enqueued and processed to completion, including
//! any awaited gateway call, before the next queued intent begins, so the
//! in-memory window is never touched by two operations concurrently and no
//! locks are needed around it. Only gateway calls suspend; local mutations
//! are synchronous.
//!
//! Outputs ride two independent channels (see `events`): the durable state
//! stream and the transient notification stream. Snapshots are emitted in
//! operation-completion order; subscribers never observe stale-then-newer-
//! then-stale flicker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::detail;
use crate::error::{CoreError, GatewayError};
use crate::events::{CoreEvent, CoreState, Notification};
use crate::gateway::InvoiceGateway;
use crate::mutation;
use crate::store::InvoiceListStore;
use crate::types::{
    Filters, InvoiceStatus, SessionContext, UploadMetadata, UploadProgress,
};
use crate::upload::UploadPipeline;

/// Mailbox depth; intents beyond this apply backpressure to the caller.
const EVENT_CHANNEL_SIZE: usize = 32;
/// Durable state stream buffer (slow subscribers lag rather than block).
const STATE_CHANNEL_SIZE: usize = 256;
const NOTIFY_CHANNEL_SIZE: usize = 64;

/// Spawn the sync core for one session and hand back its public handle.
///
/// The actor owns all mutable state; the handle only enqueues intents and
/// subscribes to the output streams. Dropping every handle closes the mailbox
/// and ends the actor task.
pub fn spawn_core(
    gateway: Arc<dyn InvoiceGateway>,
    session: SessionContext,
    page_size: u32,
) -> CoreHandle {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (state_tx, _) = broadcast::channel(STATE_CHANNEL_SIZE);
    let (notify_tx, _) = broadcast::channel(NOTIFY_CHANNEL_SIZE);
    let cancel_flag = Arc::new(AtomicBool::new(false));

    let actor = SyncActor {
        gateway,
        session,
        store: InvoiceListStore::new(page_size),
        uploads: UploadPipeline::new(cancel_flag.clone()),
        state_tx: state_tx.clone(),
        notify_tx: notify_tx.clone(),
    };
    tokio::spawn(actor.run(rx));

    CoreHandle {
        tx,
        state_tx,
        notify_tx,
        cancel_flag,
    }
}

/// Cloneable front door to the sync core.
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::Sender<CoreEvent>,
    state_tx: broadcast::Sender<CoreState>,
    notify_tx: broadcast::Sender<Notification>,
    cancel_flag: Arc<AtomicBool>,
}

impl CoreHandle {
    /// Subscribe to the durable state stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to the transient notification stream.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    pub async fn load_page(
        &self,
        page: u32,
        page_size: u32,
        filters: Filters,
        sort: Option<String>,
    ) -> Result<(), CoreError> {
        self.send(CoreEvent::LoadPage {
            page,
            page_size,
            filters,
            sort,
            refresh: false,
        })
        .await
    }

    /// Reload page 1 with the last-applied filters; the previous window stays
    /// visible until the new page swaps in.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.send(CoreEvent::Refresh).await
    }

    pub async fn load_more(&self) -> Result<(), CoreError> {
        self.send(CoreEvent::LoadMore).await
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<(), CoreError> {
        self.send(CoreEvent::DeleteOne { id: id.into() }).await
    }

    pub async fn delete_batch(&self, ids: Vec<String>) -> Result<(), CoreError> {
        self.send(CoreEvent::DeleteBatch { ids }).await
    }

    pub async fn update_status(
        &self,
        id: impl Into<String>,
        status: InvoiceStatus,
    ) -> Result<(), CoreError> {
        self.send(CoreEvent::UpdateStatus {
            id: id.into(),
            status,
        })
        .await
    }

    pub async fn upload(
        &self,
        path: impl Into<String>,
        metadata: UploadMetadata,
    ) -> Result<(), CoreError> {
        self.send(CoreEvent::Upload {
            path: path.into(),
            metadata,
        })
        .await
    }

    pub async fn upload_batch(
        &self,
        paths: Vec<String>,
        metadata: UploadMetadata,
    ) -> Result<(), CoreError> {
        self.send(CoreEvent::UploadBatch { paths, metadata }).await
    }

    /// Resubmit one file as an independent upload (in-flight guard applies).
    pub async fn retry_upload(
        &self,
        path: impl Into<String>,
        metadata: UploadMetadata,
    ) -> Result<(), CoreError> {
        self.send(CoreEvent::RetryUpload {
            path: path.into(),
            metadata,
        })
        .await
    }

    /// Cooperatively cancel uploads: raises the flag immediately (checked
    /// between files) and enqueues the tracking reset. Never aborts the
    /// in-flight gateway call.
    pub async fn cancel_uploads(&self) -> Result<(), CoreError> {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.send(CoreEvent::CancelUploads).await
    }

    pub async fn get_detail(&self, id: impl Into<String>) -> Result<(), CoreError> {
        self.send(CoreEvent::GetDetail { id: id.into() }).await
    }

    async fn send(&self, event: CoreEvent) -> Result<(), CoreError> {
        self.tx.send(event).await.map_err(|_| CoreError::CoreShutDown)
    }
}

struct SyncActor {
    gateway: Arc<dyn InvoiceGateway>,
    session: SessionContext,
    store: InvoiceListStore,
    uploads: UploadPipeline,
    state_tx: broadcast::Sender<CoreState>,
    notify_tx: broadcast::Sender<Notification>,
}

impl SyncActor {
    async fn run(mut self, mut rx: mpsc::Receiver<CoreEvent>) {
        log::info!("sync core started (account {})", self.session.account_ref);
        self.emit(CoreState::Initial);

        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        log::info!("sync core stopped (account {})", self.session.account_ref);
    }

    async fn handle(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::LoadPage {
                page,
                page_size,
                filters,
                sort,
                refresh,
            } => self.load_page(page, page_size, filters, sort, refresh).await,
            CoreEvent::Refresh => {
                let query = self.store.query_for_page(1);
                self.load_page(1, query.page_size, query.filters, query.sort, true)
                    .await;
            }
            CoreEvent::LoadMore => self.load_more().await,
            CoreEvent::DeleteOne { id } => self.delete_one(&id).await,
            CoreEvent::DeleteBatch { ids } => self.delete_batch(&ids).await,
            CoreEvent::UpdateStatus { id, status } => self.update_status(&id, status).await,
            CoreEvent::Upload { path, metadata } | CoreEvent::RetryUpload { path, metadata } => {
                self.run_uploads(vec![path], metadata).await
            }
            CoreEvent::UploadBatch { paths, metadata } => self.run_uploads(paths, metadata).await,
            CoreEvent::CancelUploads => {
                self.uploads.reset();
                self.notify(Notification::UploadsCancelled);
            }
            CoreEvent::GetDetail { id } => self.get_detail(&id).await,
        }
    }

    fn emit(&self, state: CoreState) {
        let _ = self.state_tx.send(state);
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }

    /// Emit `Error`, then the retained window so the UI recovers to the data
    /// it already had. Structural ordering, no timing involved.
    fn emit_error_with_recovery(&self, err: &GatewayError) {
        self.emit(CoreState::Error {
            message: err.to_string(),
            code: err.code().to_string(),
        });
        if self.store.pagination().current_page > 0 {
            self.emit(self.store.snapshot());
        }
    }

    async fn load_page(
        &mut self,
        page: u32,
        page_size: u32,
        filters: Filters,
        sort: Option<String>,
        refresh: bool,
    ) {
        let page = page.max(1);
        self.store.set_query_context(page_size, filters, sort);

        // A fresh page-1 query shows the spinner; a refresh keeps the old
        // window visible until the new one swaps in on success.
        if page == 1 && !refresh {
            self.emit(CoreState::Loading);
        }

        let query = self.store.query_for_page(page);
        match self.gateway.list_invoices(&query).await {
            Ok(result) => {
                self.store.apply_page(page, result);
                self.emit(self.store.snapshot());
            }
            Err(err) => {
                log::warn!("load page {} failed: {}", page, err);
                self.store.set_loading_more(false);
                self.emit_error_with_recovery(&err);
            }
        }
    }

    async fn load_more(&mut self) {
        if !self.store.can_load_more() {
            // Duplicate UI trigger, not a failure: no call, no transition.
            log::debug!(
                "load_more ignored (has_more={}, is_loading_more={})",
                self.store.pagination().has_more,
                self.store.pagination().is_loading_more
            );
            return;
        }

        self.store.set_loading_more(true);
        self.emit(self.store.snapshot());

        let next_page = self.store.pagination().current_page + 1;
        let query = self.store.query_for_page(next_page);
        match self.gateway.list_invoices(&query).await {
            Ok(result) => {
                self.store.apply_page(next_page, result);
                self.emit(self.store.snapshot());
            }
            Err(err) => {
                log::warn!("load_more (page {}) failed: {}", next_page, err);
                self.store.set_loading_more(false);
                self.emit_error_with_recovery(&err);
            }
        }
    }

    async fn delete_one(&mut self, id: &str) {
        let state_tx = self.state_tx.clone();
        let mut emit = move |state: CoreState| {
            let _ = state_tx.send(state);
        };
        match mutation::delete_one(&mut self.store, self.gateway.as_ref(), id, &mut emit).await {
            Ok(note) => self.notify(note),
            Err(err) => self.emit_error_with_recovery(&err),
        }
    }

    async fn delete_batch(&mut self, ids: &[String]) {
        match mutation::delete_batch(&mut self.store, self.gateway.as_ref(), ids).await {
            Ok(note) => {
                self.notify(note);
                self.emit(self.store.snapshot());
            }
            Err(err) => self.emit_error_with_recovery(&err),
        }
    }

    async fn update_status(&mut self, id: &str, status: InvoiceStatus) {
        let state_tx = self.state_tx.clone();
        let mut emit = move |state: CoreState| {
            let _ = state_tx.send(state);
        };
        match mutation::update_status(&mut self.store, self.gateway.as_ref(), id, status, &mut emit)
            .await
        {
            Ok(note) => self.notify(note),
            Err(err) => self.emit_error_with_recovery(&err),
        }
    }

    async fn run_uploads(&mut self, paths: Vec<String>, metadata: UploadMetadata) {
        let state_tx = self.state_tx.clone();
        let mut emit = move |progresses: &[UploadProgress], completed: usize, total: usize| {
            let _ = state_tx.send(CoreState::Uploading {
                progresses: progresses.to_vec(),
                completed,
                total,
            });
        };

        let outcome = self
            .uploads
            .run_batch(self.gateway.as_ref(), &paths, &metadata, &mut emit)
            .await;

        if outcome.cancelled {
            // No aggregate for a cancelled batch; revert to the window.
            self.emit(self.store.snapshot());
            return;
        }

        for result in &outcome.results {
            if let Some(invoice) = result.invoice.clone() {
                self.store.prepend(invoice);
            }
        }

        self.emit(CoreState::UploadCompleted {
            results: outcome.results,
            success_count: outcome.success_count,
            failure_count: outcome.failure_count,
            duplicate_count: outcome.duplicate_count,
        });
        self.emit(self.store.snapshot());
    }

    async fn get_detail(&mut self, id: &str) {
        let warm = self.store.get(id).is_some() || self.store.get_cached_detail(id).is_some();
        if !warm {
            self.emit(CoreState::DetailLoading);
        }

        match detail::get_detail(&mut self.store, self.gateway.as_ref(), id).await {
            Ok((record, source)) => {
                log::debug!("detail {} resolved from {:?}", id, source);
                self.emit(CoreState::DetailLoaded { record });
            }
            Err(err) => self.emit_error_with_recovery(&err),
        }
    }
}

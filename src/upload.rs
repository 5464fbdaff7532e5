//! Staged upload pipeline.
//!
//! Each file walks a monotonic state machine: the four synthetic stages
//! (preparing → hashing → uploading → processing) are emitted locally before
//! the single blocking gateway call resolves the terminal stage. The hashing
//! stage does real work (the SHA-256 digest rides along in the request for
//! server-side duplicate detection), but the stage fractions themselves are
//! advisory UI feedback only; the gateway offers no streaming progress.
//!
//! Batches run strictly sequentially to bound load on the gateway and keep
//! per-file progress deterministic and independently observable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::gateway::{InvoiceGateway, UploadRequest};
use crate::types::{UploadMetadata, UploadProgress, UploadResult, UploadStage};

/// Error code for uploads refused by the in-flight guard.
pub const CODE_UPLOAD_IN_FLIGHT: &str = "UPLOAD_IN_FLIGHT";
/// Error code for files that could not be read off disk.
pub const CODE_IO_ERROR: &str = "IO_ERROR";
/// Error code for failures reported inside an upload outcome.
pub const CODE_UPLOAD_FAILED: &str = "UPLOAD_FAILED";

/// Snapshot callback: `(progresses, completed, total)`.
pub type ProgressEmit<'a> = &'a mut (dyn FnMut(&[UploadProgress], usize, usize) + Send);

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<UploadResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub duplicate_count: usize,
    /// True when the cancel flag stopped the batch before all files ran.
    pub cancelled: bool,
}

impl BatchOutcome {
    fn tally(results: Vec<UploadResult>, cancelled: bool) -> Self {
        let success_count = results.iter().filter(|r| r.is_success).count();
        let duplicate_count = results.iter().filter(|r| r.is_duplicate).count();
        let failure_count = results.len() - success_count - duplicate_count;
        Self {
            results,
            success_count,
            failure_count,
            duplicate_count,
            cancelled,
        }
    }
}

pub struct UploadPipeline {
    in_flight: HashSet<String>,
    cancel: Arc<AtomicBool>,
}

impl UploadPipeline {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            in_flight: HashSet::new(),
            cancel,
        }
    }

    /// Reset local tracking to its initial state.
    ///
    /// Cooperative only: an in-flight gateway call keeps running; this merely
    /// clears the guard set and lowers the cancel flag.
    pub fn reset(&mut self) {
        self.in_flight.clear();
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// Run a batch of files through the pipeline, strictly in order.
    ///
    /// `emit` fires on every stage transition and again after each file
    /// resolves. For an uncancelled batch,
    /// `success + failure + duplicate == paths.len()`.
    pub async fn run_batch(
        &mut self,
        gateway: &dyn InvoiceGateway,
        paths: &[String],
        metadata: &UploadMetadata,
        emit: ProgressEmit<'_>,
    ) -> BatchOutcome {
        let total = paths.len();
        let mut progresses: Vec<UploadProgress> =
            paths.iter().map(|p| UploadProgress::new(p)).collect();
        let mut results: Vec<UploadResult> = Vec::with_capacity(total);
        emit(&progresses, 0, total);

        let mut cancelled = false;
        for (index, path) in paths.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                log::info!(
                    "upload batch cancelled after {} of {} files",
                    index,
                    total
                );
                cancelled = true;
                break;
            }

            let result = self
                .upload_file(gateway, path, metadata, index, &mut progresses, total, emit)
                .await;
            results.push(result);
            emit(&progresses, index + 1, total);
        }

        BatchOutcome::tally(results, cancelled)
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_file(
        &mut self,
        gateway: &dyn InvoiceGateway,
        path: &str,
        metadata: &UploadMetadata,
        index: usize,
        progresses: &mut Vec<UploadProgress>,
        total: usize,
        emit: ProgressEmit<'_>,
    ) -> UploadResult {
        if !self.in_flight.insert(path.to_string()) {
            log::warn!("upload for {} already in flight, refusing resubmit", path);
            fail_stage(
                &mut progresses[index],
                "a previous attempt for this file is still in flight",
            );
            emit(progresses, index, total);
            return UploadResult::failure(
                path,
                format!("upload for {path} is already in flight"),
                CODE_UPLOAD_IN_FLIGHT,
            );
        }

        let result = drive_stages(gateway, path, metadata, index, progresses, total, emit).await;
        self.in_flight.remove(path);
        result
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive_stages(
    gateway: &dyn InvoiceGateway,
    path: &str,
    metadata: &UploadMetadata,
    index: usize,
    progresses: &mut [UploadProgress],
    total: usize,
    emit: ProgressEmit<'_>,
) -> UploadResult {
    // Preparing: confirm the file is actually there.
    advance_stage(&mut progresses[index], UploadStage::Preparing, None);
    emit(progresses, index, total);
    if let Err(err) = tokio::fs::metadata(path).await {
        fail_stage(&mut progresses[index], &err.to_string());
        emit(progresses, index, total);
        return UploadResult::failure(
            path,
            format!("cannot read {path}: {err}"),
            CODE_IO_ERROR,
        );
    }

    // Hashing: digest the bytes the request will carry.
    advance_stage(&mut progresses[index], UploadStage::Hashing, None);
    emit(progresses, index, total);
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            fail_stage(&mut progresses[index], &err.to_string());
            emit(progresses, index, total);
            return UploadResult::failure(
                path,
                format!("cannot read {path}: {err}"),
                CODE_IO_ERROR,
            );
        }
    };
    let sha256 = hex::encode(Sha256::digest(&bytes));

    // Uploading, then processing: both advisory; the gateway call below
    // is atomic from our side.
    advance_stage(&mut progresses[index], UploadStage::Uploading, None);
    emit(progresses, index, total);
    advance_stage(
        &mut progresses[index],
        UploadStage::Processing,
        Some("waiting for extraction".to_string()),
    );
    emit(progresses, index, total);

    let request = UploadRequest {
        file_path: path.to_string(),
        file_name: progresses[index].file_name.clone(),
        bytes,
        sha256,
        idempotency_key: uuid::Uuid::new_v4().to_string(),
        metadata: metadata.clone(),
    };

    let result = match gateway.upload_invoice(request).await {
        Ok(outcome) => {
            if outcome.is_duplicate {
                advance_stage(
                    &mut progresses[index],
                    UploadStage::Duplicate,
                    Some("duplicate detected".to_string()),
                );
                UploadResult::duplicate(
                    path,
                    outcome.duplicate_info,
                    outcome.cross_user_duplicate_info,
                )
            } else if outcome.is_success {
                match outcome.invoice {
                    Some(invoice) => {
                        advance_stage(&mut progresses[index], UploadStage::Success, None);
                        UploadResult::success(path, invoice)
                    }
                    None => {
                        fail_stage(&mut progresses[index], "no invoice in upload outcome");
                        UploadResult::failure(
                            path,
                            "backend reported success without an invoice".to_string(),
                            "DATA_FORMAT_ERROR",
                        )
                    }
                }
            } else {
                let message = outcome
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "upload failed".to_string());
                fail_stage(&mut progresses[index], &message);
                UploadResult::failure(path, message, CODE_UPLOAD_FAILED)
            }
        }
        Err(err) => {
            fail_stage(&mut progresses[index], &err.to_string());
            UploadResult::failure(path, err.to_string(), err.code())
        }
    };

    emit(progresses, index, total);
    result
}

/// Advance a file's stage, ignoring regressions: the machine is monotonic and
/// terminal stages are final.
fn advance_stage(progress: &mut UploadProgress, stage: UploadStage, message: Option<String>) {
    if progress.stage.is_terminal() || stage < progress.stage {
        if stage != progress.stage {
            log::warn!(
                "ignoring stage regression {:?} -> {:?} for {}",
                progress.stage,
                stage,
                progress.file_name
            );
        }
        return;
    }
    progress.stage = stage;
    progress.progress = stage.progress_fraction();
    progress.message = message;
    progress.error = None;
}

fn fail_stage(progress: &mut UploadProgress, error: &str) {
    if progress.stage.is_terminal() {
        return;
    }
    progress.stage = UploadStage::Error;
    progress.progress = UploadStage::Error.progress_fraction();
    progress.error = Some(error.to_string());
}

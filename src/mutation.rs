//! Optimistic mutation coordinator.
//!
//! Single-record operations apply locally first and reconcile with the
//! gateway afterwards, rolling back exactly to the pre-mutation state on
//! failure. Batch delete is conservative: it waits for the gateway before
//! touching local state.

use crate::error::GatewayError;
use crate::events::{CoreState, Notification};
use crate::gateway::InvoiceGateway;
use crate::store::InvoiceListStore;
use crate::types::InvoiceStatus;

/// Optimistically delete one invoice.
///
/// Absent ids fail fast without a gateway call. The record is removed (and
/// `total_count` decremented) before the gateway call; `emit` receives the
/// optimistic snapshot so the UI updates immediately. On gateway failure the
/// record is re-inserted at its original index; membership and count are
/// bit-identical to the pre-delete state.
pub async fn delete_one(
    store: &mut InvoiceListStore,
    gateway: &dyn InvoiceGateway,
    id: &str,
    emit: &mut (dyn FnMut(CoreState) + Send),
) -> Result<Notification, GatewayError> {
    let Some((index, record)) = store.remove(id) else {
        return Err(GatewayError::NotFound(format!(
            "invoice {id} is not in the current window"
        )));
    };
    emit(store.snapshot());

    match gateway.delete_invoice(id).await {
        Ok(()) => {
            log::info!("deleted invoice {} ({})", id, record.invoice_number);
            Ok(Notification::DeleteSucceeded {
                message: format!("Invoice {} deleted", record.invoice_number),
            })
        }
        Err(err) => {
            log::warn!("delete {} failed, rolling back: {}", id, err);
            store.restore_at(index, record);
            Err(err)
        }
    }
}

/// Delete a batch of invoices with one aggregated gateway call.
///
/// Not optimistic: local state is mutated only after the gateway confirms.
pub async fn delete_batch(
    store: &mut InvoiceListStore,
    gateway: &dyn InvoiceGateway,
    ids: &[String],
) -> Result<Notification, GatewayError> {
    if ids.is_empty() {
        return Ok(Notification::DeleteSucceeded {
            message: "0 invoices deleted".to_string(),
        });
    }

    gateway.delete_invoices(ids).await?;
    let removed = store.remove_all(ids);
    log::info!("batch delete removed {} of {} ids", removed, ids.len());
    Ok(Notification::DeleteSucceeded {
        message: format!("{removed} invoices deleted"),
    })
}

/// Optimistically update one invoice's reimbursement status.
///
/// A failed update rolls the status back to its prior value, the same
/// contract as delete: local state after a failure is exactly the pre-mutation state.
pub async fn update_status(
    store: &mut InvoiceListStore,
    gateway: &dyn InvoiceGateway,
    id: &str,
    status: InvoiceStatus,
    emit: &mut (dyn FnMut(CoreState) + Send),
) -> Result<Notification, GatewayError> {
    let Some(previous) = store.set_status(id, status) else {
        return Err(GatewayError::NotFound(format!(
            "invoice {id} is not in the current window"
        )));
    };
    emit(store.snapshot());

    match gateway.update_status(id, status).await {
        Ok(()) => Ok(Notification::StatusUpdated {
            id: id.to_string(),
            status,
        }),
        Err(err) => {
            log::warn!("status update {} failed, rolling back: {}", id, err);
            store.set_status(id, previous);
            Err(err)
        }
    }
}

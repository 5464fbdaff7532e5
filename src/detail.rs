//! Detail resolution: local window first, side cache second, gateway last.
//!
//! A cache hit never issues a gateway call; a miss warms the store so the
//! next lookup for the same id stays local.

use crate::error::GatewayError;
use crate::gateway::InvoiceGateway;
use crate::store::InvoiceListStore;
use crate::types::InvoiceRecord;

/// Where a detail lookup was resolved (observable for diagnostics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailSource {
    Window,
    SideCache,
    Gateway,
}

pub async fn get_detail(
    store: &mut InvoiceListStore,
    gateway: &dyn InvoiceGateway,
    id: &str,
) -> Result<(InvoiceRecord, DetailSource), GatewayError> {
    if let Some(record) = store.get(id) {
        return Ok((record.clone(), DetailSource::Window));
    }
    if let Some(record) = store.get_cached_detail(id) {
        return Ok((record.clone(), DetailSource::SideCache));
    }

    log::debug!("detail cache miss for {}, fetching", id);
    let record = gateway.fetch_detail(id).await?;
    store.warm_detail(record.clone());
    Ok((record, DetailSource::Gateway))
}

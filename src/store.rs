//! In-memory invoice window: ordered records plus pagination counters.
//!
//! The store is exclusively owned by the actor; all mutation happens on one
//! logical thread of control, so there are no locks here. The paged window is
//! an order-preserving, id-keyed map (append-dedup makes pagination
//! idempotent); gateway-warmed details that fall outside the window live in a
//! side cache so they never skew the pagination counters.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::events::CoreState;
use crate::gateway::PagedResult;
use crate::types::{Filters, InvoiceRecord, InvoiceStatus, ListQuery, PaginationState};

pub struct InvoiceListStore {
    records: IndexMap<String, InvoiceRecord>,
    detail_cache: HashMap<String, InvoiceRecord>,
    pagination: PaginationState,
    last_filters: Filters,
    last_sort: Option<String>,
}

impl InvoiceListStore {
    pub fn new(page_size: u32) -> Self {
        Self {
            records: IndexMap::new(),
            detail_cache: HashMap::new(),
            pagination: PaginationState::new(page_size),
            last_filters: Filters::default(),
            last_sort: None,
        }
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// O(1) lookup in the paged window.
    pub fn get(&self, id: &str) -> Option<&InvoiceRecord> {
        self.records.get(id)
    }

    /// Lookup in the side cache of gateway-warmed details.
    pub fn get_cached_detail(&self, id: &str) -> Option<&InvoiceRecord> {
        self.detail_cache.get(id)
    }

    /// Warm the side cache with a gateway-fetched record.
    ///
    /// Records already in the paged window are refreshed in place instead, so
    /// the window stays the single source of truth for listed invoices.
    pub fn warm_detail(&mut self, record: InvoiceRecord) {
        if let Some(existing) = self.records.get_mut(&record.id) {
            *existing = record;
        } else {
            self.detail_cache.insert(record.id.clone(), record);
        }
    }

    /// The query that reproduces the current window's contents.
    pub fn query_for_page(&self, page: u32) -> ListQuery {
        ListQuery {
            page,
            page_size: self.pagination.page_size,
            filters: self.last_filters.clone(),
            sort: self.last_sort.clone(),
        }
    }

    /// Remember the filter/sort pair to replay on refresh and load-more.
    pub fn set_query_context(&mut self, page_size: u32, filters: Filters, sort: Option<String>) {
        self.pagination.page_size = page_size;
        self.last_filters = filters;
        self.last_sort = sort;
    }

    pub fn set_loading_more(&mut self, loading: bool) {
        self.pagination.is_loading_more = loading;
    }

    /// Whether a load-more intent should proceed at all.
    pub fn can_load_more(&self) -> bool {
        self.pagination.has_more && !self.pagination.is_loading_more
    }

    /// Commit a successfully fetched page.
    ///
    /// Page 1 replaces the window atomically (this is the only moment the old
    /// records vanish; a failed fetch never touches them); later pages append
    /// with order-preserving dedup, so a replayed page is idempotent.
    pub fn apply_page(&mut self, page: u32, result: PagedResult) {
        if page <= 1 {
            self.records.clear();
        }
        for invoice in result.invoices {
            self.records.insert(invoice.id.clone(), invoice);
        }

        self.pagination.current_page = page.max(1);
        self.pagination.total_count = result.total;
        self.pagination.is_loading_more = false;
        self.pagination.recompute_has_more();

        if self.pagination.has_more != result.has_more {
            log::debug!(
                "server hasMore={} disagrees with computed {} (page {}, total {})",
                result.has_more,
                self.pagination.has_more,
                page,
                result.total
            );
        }
    }

    /// Prepend a freshly uploaded invoice and bump the total.
    pub fn prepend(&mut self, invoice: InvoiceRecord) {
        self.records.shift_insert(0, invoice.id.clone(), invoice);
        self.pagination.total_count += 1;
        self.pagination.recompute_has_more();
    }

    /// Optimistically remove a record, returning its position for rollback.
    pub fn remove(&mut self, id: &str) -> Option<(usize, InvoiceRecord)> {
        let (index, _, record) = self.records.shift_remove_full(id)?;
        self.pagination.total_count = self.pagination.total_count.saturating_sub(1);
        self.pagination.recompute_has_more();
        Some((index, record))
    }

    /// Undo an optimistic removal, restoring position and count exactly.
    pub fn restore_at(&mut self, index: usize, record: InvoiceRecord) {
        let index = index.min(self.records.len());
        self.records.shift_insert(index, record.id.clone(), record);
        self.pagination.total_count += 1;
        self.pagination.recompute_has_more();
    }

    /// Remove every listed id, returning how many were actually present.
    pub fn remove_all(&mut self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.records.shift_remove(id).is_some() {
                removed += 1;
            }
            self.detail_cache.remove(id);
        }
        self.pagination.total_count = self.pagination.total_count.saturating_sub(removed as u64);
        self.pagination.recompute_has_more();
        removed
    }

    /// Mutate a record's status in place, returning the prior status.
    pub fn set_status(&mut self, id: &str, status: InvoiceStatus) -> Option<InvoiceStatus> {
        let record = self.records.get_mut(id)?;
        let previous = record.status;
        record.status = status;
        Some(previous)
    }

    /// Immutable snapshot of `{records, pagination}` for the state stream.
    pub fn snapshot(&self) -> CoreState {
        CoreState::Loaded {
            records: self.records.values().cloned().collect(),
            page: self.pagination.current_page,
            total: self.pagination.total_count,
            has_more: self.pagination.has_more,
            is_loading_more: self.pagination.is_loading_more,
        }
    }

    /// Plain record list (tests and the CLI table printer).
    pub fn records(&self) -> Vec<InvoiceRecord> {
        self.records.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{invoice, page_of};

    fn loaded_store() -> InvoiceListStore {
        let mut store = InvoiceListStore::new(20);
        store.apply_page(1, page_of(0, 20, 57));
        store
    }

    #[test]
    fn pagination_arithmetic_over_three_pages() {
        let mut store = InvoiceListStore::new(20);

        store.apply_page(1, page_of(0, 20, 57));
        assert_eq!(store.len(), 20);
        assert_eq!(store.pagination().current_page, 1);
        assert!(store.pagination().has_more);

        store.apply_page(2, page_of(20, 20, 57));
        assert_eq!(store.len(), 40);
        assert_eq!(store.pagination().current_page, 2);
        assert!(store.pagination().has_more);

        store.apply_page(3, page_of(40, 17, 57));
        assert_eq!(store.len(), 57);
        assert_eq!(store.pagination().current_page, 3);
        assert!(!store.pagination().has_more);
    }

    #[test]
    fn page_one_replaces_window() {
        let mut store = loaded_store();
        store.apply_page(1, page_of(100, 5, 5));
        assert_eq!(store.len(), 5);
        assert!(store.get("inv-0").is_none());
        assert!(store.get("inv-100").is_some());
        assert!(!store.pagination().has_more);
    }

    #[test]
    fn append_dedups_overlapping_page() {
        let mut store = loaded_store();
        // Page 2 overlaps the tail of page 1 (backend shifted under us).
        store.apply_page(2, page_of(15, 20, 57));
        assert_eq!(store.len(), 35, "overlapping ids must not double up");
    }

    #[test]
    fn remove_and_restore_are_bit_identical() {
        let mut store = loaded_store();
        let before = store.records();
        let total_before = store.pagination().total_count;

        let (index, record) = store.remove("inv-7").expect("present");
        assert_eq!(index, 7);
        assert_eq!(store.len(), 19);
        assert_eq!(store.pagination().total_count, total_before - 1);

        store.restore_at(index, record);
        assert_eq!(store.records(), before);
        assert_eq!(store.pagination().total_count, total_before);
    }

    #[test]
    fn remove_all_counts_only_present_ids() {
        let mut store = loaded_store();
        let removed = store.remove_all(&[
            "inv-1".to_string(),
            "inv-2".to_string(),
            "ghost".to_string(),
        ]);
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 18);
        assert_eq!(store.pagination().total_count, 55);
    }

    #[test]
    fn prepend_bumps_total_and_leads_window() {
        let mut store = loaded_store();
        store.prepend(invoice("fresh"));
        assert_eq!(store.records()[0].id, "fresh");
        assert_eq!(store.pagination().total_count, 58);
    }

    #[test]
    fn set_status_returns_previous() {
        let mut store = loaded_store();
        let previous = store.set_status("inv-3", InvoiceStatus::Reimbursed);
        assert_eq!(previous, Some(InvoiceStatus::Unreimbursed));
        assert_eq!(store.get("inv-3").unwrap().status, InvoiceStatus::Reimbursed);
        assert!(store.set_status("ghost", InvoiceStatus::Pending).is_none());
    }

    #[test]
    fn warm_detail_prefers_window_over_side_cache() {
        let mut store = loaded_store();

        // Off-window record lands in the side cache, counters untouched.
        store.warm_detail(invoice("off-window"));
        assert!(store.get("off-window").is_none());
        assert!(store.get_cached_detail("off-window").is_some());
        assert_eq!(store.pagination().total_count, 57);

        // In-window record is refreshed in place.
        let mut updated = invoice("inv-4");
        updated.seller_name = "Updated Seller".to_string();
        store.warm_detail(updated);
        assert_eq!(store.get("inv-4").unwrap().seller_name, "Updated Seller");
        assert!(store.get_cached_detail("inv-4").is_none());
    }

    #[test]
    fn load_more_guard() {
        let mut store = loaded_store();
        assert!(store.can_load_more());

        store.set_loading_more(true);
        assert!(!store.can_load_more());
        store.set_loading_more(false);

        store.apply_page(3, page_of(40, 17, 57));
        assert!(!store.can_load_more(), "no more pages past the total");
    }
}

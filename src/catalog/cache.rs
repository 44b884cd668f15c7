//! Request-shared cache of company catalogs.
//!
//! Company lists are consulted several times per request (once to resolve a
//! name, again to list alternatives on failure), so the full catalog of each
//! kind is fetched once and kept until [`CatalogCache::invalidate`] is called.
//! Backend searches narrow a truncated catalog for one name; they are keyed by
//! user text and are never cached.
//!
//! A failed fetch is remembered for `retry_after`, then the next reader
//! fetches again.
//!
//! # Concurrency
//! Each key owns a `tokio::sync::OnceCell`. Concurrent misses on the same key
//! await the same initialization, so the backend sees a single fetch. The map
//! lock is only held to look up, insert or evict a cell, never across an await.

use crate::catalog::types::{Catalog, CatalogQuery, CatalogRecord, CompanyKind};
use crate::error::UpstreamError;
use crate::upstream::MarketplaceApi;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// How long a failed catalog fetch is served from cache before a retry.
pub const DEFAULT_FAILURE_RETRY: Duration = Duration::from_secs(30);

/// Cached outcome of one catalog fetch.
#[derive(Debug, Clone)]
pub enum CatalogSlot {
    Ready(Catalog),
    /// The fetch failed. Readers see an empty catalog until `at` is older
    /// than the cache's retry interval.
    Failed { error: UpstreamError, at: Instant },
}

impl CatalogSlot {
    pub fn records(&self) -> &[CatalogRecord] {
        match self {
            CatalogSlot::Ready(catalog) => &catalog.records,
            CatalogSlot::Failed { .. } => &[],
        }
    }

    pub fn failure(&self) -> Option<&UpstreamError> {
        match self {
            CatalogSlot::Failed { error, .. } => Some(error),
            CatalogSlot::Ready(_) => None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, CatalogSlot::Ready(catalog) if catalog.is_truncated())
    }

    fn is_stale_failure(&self, retry_after: Duration) -> bool {
        matches!(self, CatalogSlot::Failed { at, .. } if at.elapsed() >= retry_after)
    }
}

type Cell = Arc<OnceCell<Arc<CatalogSlot>>>;

pub struct CatalogCache {
    api: Arc<dyn MarketplaceApi>,
    page_size: u32,
    retry_after: Duration,
    slots: RwLock<HashMap<CatalogQuery, Cell>>,
}

impl CatalogCache {
    pub fn new(api: Arc<dyn MarketplaceApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            retry_after: DEFAULT_FAILURE_RETRY,
            slots: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_failure_retry(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Every company of `kind` (page 1 with a large page size).
    pub async fn all(&self, kind: CompanyKind) -> Arc<CatalogSlot> {
        self.get(&CatalogQuery::all(kind, self.page_size)).await
    }

    /// Companies of `kind` matching a backend-side search term. Not cached.
    pub async fn search(&self, kind: CompanyKind, term: &str) -> Arc<CatalogSlot> {
        Arc::new(self.fetch(&CatalogQuery::search(kind, term, self.page_size)).await)
    }

    /// Return the cached catalog for `query`, fetching it on first use or
    /// once a cached failure has expired.
    pub async fn get(&self, query: &CatalogQuery) -> Arc<CatalogSlot> {
        let mut cell = self.cell(query);
        if cell
            .get()
            .is_some_and(|slot| slot.is_stale_failure(self.retry_after))
        {
            tracing::debug!(kind = query.kind.label(), "Cached catalog failure expired, retrying");
            self.evict(query, &cell);
            cell = self.cell(query);
        }

        let slot = cell
            .get_or_init(|| async { Arc::new(self.fetch(query).await) })
            .await;
        Arc::clone(slot)
    }

    /// Drop every cached catalog of `kind`.
    pub fn invalidate(&self, kind: CompanyKind) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|query, _| query.kind != kind);
        tracing::debug!(
            kind = kind.label(),
            dropped = before - slots.len(),
            "Catalog cache invalidated"
        );
    }

    /// Number of catalog queries with a cell, fetched or in flight.
    pub fn cached_queries(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn fetch(&self, query: &CatalogQuery) -> CatalogSlot {
        metrics::counter!("catalog_fetches_total", "kind" => query.kind.label()).increment(1);

        match self.api.list_companies(query).await {
            Ok(envelope) => {
                let catalog = Catalog::companies_from_envelope(&envelope);
                tracing::debug!(
                    kind = query.kind.label(),
                    search = ?query.search,
                    records = catalog.records.len(),
                    total = catalog.total_count,
                    "Catalog fetched"
                );
                CatalogSlot::Ready(catalog)
            }
            Err(error) => {
                tracing::warn!(
                    kind = query.kind.label(),
                    search = ?query.search,
                    error = %error,
                    "Catalog fetch failed"
                );
                CatalogSlot::Failed {
                    error,
                    at: Instant::now(),
                }
            }
        }
    }

    fn cell(&self, query: &CatalogQuery) -> Cell {
        if let Some(cell) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
        {
            return Arc::clone(cell);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(query.clone()).or_default())
    }

    /// Remove `stale` unless another reader already replaced it.
    fn evict(&self, query: &CatalogQuery, stale: &Cell) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.get(query).is_some_and(|current| Arc::ptr_eq(current, stale)) {
            slots.remove(query);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::testing::FakeMarketplace;
    use serde_json::json;

    fn companies() -> serde_json::Value {
        json!({"data": {"itemList": [
            {"_id": "c1", "name": "DHL Express"},
            {"_id": "c2", "name": "Aramex"}
        ], "totalCount": 2}})
    }

    #[tokio::test]
    async fn test_second_get_is_served_from_cache() {
        let api = Arc::new(FakeMarketplace::new().with_companies(CompanyKind::Delivery, companies()));
        let cache = CatalogCache::new(api.clone(), 100);

        let first = cache.all(CompanyKind::Delivery).await;
        let second = cache.all(CompanyKind::Delivery).await;

        assert_eq!(first.records().len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.company_fetches(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_for_that_kind_only() {
        let api = Arc::new(
            FakeMarketplace::new()
                .with_companies(CompanyKind::Delivery, companies())
                .with_companies(CompanyKind::Rental, companies()),
        );
        let cache = CatalogCache::new(api.clone(), 100);

        cache.all(CompanyKind::Delivery).await;
        cache.all(CompanyKind::Rental).await;
        cache.invalidate(CompanyKind::Delivery);
        cache.all(CompanyKind::Delivery).await;
        cache.all(CompanyKind::Rental).await;

        assert_eq!(api.company_fetches(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_misses_issue_one_fetch() {
        let api = Arc::new(
            FakeMarketplace::new()
                .with_companies(CompanyKind::Delivery, companies())
                .with_latency(std::time::Duration::from_millis(50)),
        );
        let cache = Arc::new(CatalogCache::new(api.clone(), 100));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.all(CompanyKind::Delivery).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().records().len(), 2);
        }

        assert_eq!(api.company_fetches(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_as_empty() {
        let api = Arc::new(FakeMarketplace::new().failing_with(UpstreamError::Status(500)));
        let cache = CatalogCache::new(api.clone(), 100);

        let slot = cache.all(CompanyKind::Rental).await;
        assert!(slot.records().is_empty());
        assert_eq!(slot.failure(), Some(&UpstreamError::Status(500)));

        cache.all(CompanyKind::Rental).await;
        assert_eq!(api.company_fetches(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_retried_after_interval() {
        let api = Arc::new(
            FakeMarketplace::new()
                .with_companies(CompanyKind::Delivery, companies())
                .failing_first(1, UpstreamError::Status(503)),
        );
        let cache = CatalogCache::new(api.clone(), 100).with_failure_retry(Duration::ZERO);

        let first = cache.all(CompanyKind::Delivery).await;
        assert!(first.failure().is_some());

        let second = cache.all(CompanyKind::Delivery).await;
        assert_eq!(second.records().len(), 2);
        let third = cache.all(CompanyKind::Delivery).await;
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(api.company_fetches(), 2);
        assert_eq!(cache.cached_queries(), 1);
    }

    #[tokio::test]
    async fn test_searches_are_not_cached() {
        let api = Arc::new(FakeMarketplace::new().with_companies(CompanyKind::Delivery, companies()));
        let cache = CatalogCache::new(api.clone(), 100);

        let found = cache.search(CompanyKind::Delivery, "DHL ").await;
        cache.search(CompanyKind::Delivery, "dhl").await;
        cache.search(CompanyKind::Delivery, "aramex").await;

        assert_eq!(found.records().len(), 1);
        assert_eq!(api.company_fetches(), 3);
        assert_eq!(cache.cached_queries(), 0);
    }
}

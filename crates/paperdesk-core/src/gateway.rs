//! Cache-aside search gateway in front of the catalog.
//!
//! Search pages are cached under a key derived from the translated query and
//! the paging window, and trusted for `search_ttl` after the write. Records
//! fetched by id are cached under their own key namespace and never expire.
//! Entries are written only after a successful fetch, so a failed upstream
//! call leaves whatever was cached before untouched. Stale entries are never
//! served, even when the upstream call fails.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{CatalogClient, CatalogError};
use crate::clock::{Clock, SystemClock};
use crate::query::{self, SearchCriteria};
use crate::record::{Record, RecordPage};
use crate::store::{CacheEntry, CachePayload, CacheStore, normalize_key};

/// Default freshness window for cached search pages.
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const ID_QUERY_PREFIX: &str = "id:";

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("catalog request failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("no record with id {0}")]
    NotFound(String),
}

/// Cache key for a search page.
pub fn search_key(query: &str, offset: u32, page_size: u32) -> String {
    format!("search_{}_{offset}_{page_size}", urlencoding::encode(query))
}

/// Cache key for a single record.
pub fn record_key(id: &str) -> String {
    format!("id_{}", normalize_key(normalize_id(id)))
}

/// Strip whitespace and the common prefixes people paste along with an arXiv id.
pub fn normalize_id(id: &str) -> &str {
    let id = id.trim();
    for prefix in [
        "https://arxiv.org/abs/",
        "http://arxiv.org/abs/",
        "arXiv:",
        "arxiv:",
    ] {
        if let Some(rest) = id.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    id
}

pub struct SearchGateway {
    catalog: Arc<dyn CatalogClient>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    search_ttl: Duration,
}

impl SearchGateway {
    pub fn new(catalog: Arc<dyn CatalogClient>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            catalog,
            cache,
            clock: Arc::new(SystemClock),
            search_ttl: DEFAULT_SEARCH_TTL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_search_ttl(mut self, ttl: Duration) -> Self {
        self.search_ttl = ttl;
        self
    }

    pub fn search_ttl(&self) -> Duration {
        self.search_ttl
    }

    /// Translate `criteria` and return one page of results.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        offset: u32,
        page_size: u32,
    ) -> Result<RecordPage, RetrievalError> {
        let query = query::translate_on(criteria, self.clock.today());
        self.search_page(&query, offset, page_size).await
    }

    /// Run an already-built catalog query.
    ///
    /// A query of the form `id:<identifier>` is answered by an id lookup and
    /// returned as a one-item page.
    pub async fn search_query(
        &self,
        query: &str,
        offset: u32,
        page_size: u32,
    ) -> Result<RecordPage, RetrievalError> {
        let query = query.trim();
        if let Some(id) = query.strip_prefix(ID_QUERY_PREFIX)
            && !id.trim().is_empty()
        {
            let record = self.fetch_by_id(id).await?;
            return Ok(RecordPage {
                items: vec![record],
                total_results: 1,
                start_index: 0,
                items_per_page: 1,
            });
        }
        let query = if query.is_empty() { query::MATCH_ALL } else { query };
        self.search_page(query, offset, page_size).await
    }

    /// Look up one record. Once cached, a record is never fetched again.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Record, RetrievalError> {
        let id = normalize_id(id);
        let key = record_key(id);

        if let Some(entry) = self.read_cache(&key).await
            && let CachePayload::Record(record) = entry.payload
        {
            tracing::trace!(key = %key, "record cache hit");
            return Ok(record);
        }

        tracing::debug!(catalog = self.catalog.name(), id, "fetching record");
        let record = self
            .catalog
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| RetrievalError::NotFound(id.to_string()))?;

        self.write_cache(&key, &CachePayload::Record(record.clone())).await;
        Ok(record)
    }

    async fn search_page(
        &self,
        query: &str,
        offset: u32,
        page_size: u32,
    ) -> Result<RecordPage, RetrievalError> {
        let key = search_key(query, offset, page_size);

        if let Some(entry) = self.read_cache(&key).await {
            if self.is_fresh(&entry)
                && let CachePayload::Page(page) = entry.payload
            {
                tracing::trace!(key = %key, "search cache hit");
                return Ok(page);
            }
            tracing::trace!(key = %key, cached_at = %entry.cached_at, "search cache entry expired");
        } else {
            tracing::trace!(key = %key, "search cache miss");
        }

        tracing::debug!(catalog = self.catalog.name(), query, offset, page_size, "querying catalog");
        let page = self.catalog.query(query, offset, page_size).await?;

        self.write_cache(&key, &CachePayload::Page(page.clone())).await;
        Ok(page)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = self.clock.now() - entry.cached_at;
        match chrono::Duration::from_std(self.search_ttl) {
            Ok(ttl) => age < ttl,
            Err(_) => true,
        }
    }

    /// A failing read is logged and treated as a miss.
    async fn read_cache(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// A failing write is logged; the caller still returns the fresh payload.
    async fn write_cache(&self, key: &str, payload: &CachePayload) {
        if let Err(e) = self.cache.put(key, payload, self.clock.now()).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock::{MockCatalog, MockResponse};
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, StoreError, StoreFuture};
    use chrono::{TimeZone, Utc};

    fn record(id: &str) -> Record {
        Record {
            id: id.into(),
            title: format!("Paper {id}"),
            ..Default::default()
        }
    }

    fn page(ids: &[&str]) -> RecordPage {
        RecordPage {
            items: ids.iter().map(|id| record(id)).collect(),
            total_results: 42,
            start_index: 0,
            items_per_page: 10,
        }
    }

    struct Harness {
        catalog: Arc<MockCatalog>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        gateway: SearchGateway,
    }

    fn harness(catalog: MockCatalog) -> Harness {
        let catalog = Arc::new(catalog);
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
        ));
        let gateway = SearchGateway::new(catalog.clone(), store.clone()).with_clock(clock.clone());
        Harness {
            catalog,
            store,
            clock,
            gateway,
        }
    }

    /// A cache whose every operation fails.
    struct BrokenCache;

    impl CacheStore for BrokenCache {
        fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<CacheEntry>> {
            Box::pin(async { Err(StoreError::Task("disk on fire".into())) })
        }

        fn put<'a>(
            &'a self,
            _key: &'a str,
            _payload: &'a CachePayload,
            _at: chrono::DateTime<Utc>,
        ) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(StoreError::Task("disk on fire".into())) })
        }
    }

    #[test]
    fn keys_are_namespaced_and_encoded() {
        assert_eq!(
            search_key("ti:deep_learning AND cat:cs.LG", 20, 10),
            "search_ti%3Adeep_learning%20AND%20cat%3Acs.LG_20_10"
        );
        assert_eq!(record_key(" arXiv:2101.00001 "), "id_2101.00001");
        assert_eq!(record_key("hep-th/9901001"), "id_hep-th_9901001");
        assert_ne!(search_key("all", 0, 10), search_key("all", 10, 10));
    }

    #[test]
    fn normalize_id_strips_abs_url() {
        assert_eq!(normalize_id("http://arxiv.org/abs/1706.03762v7"), "1706.03762v7");
        assert_eq!(normalize_id("1706.03762"), "1706.03762");
    }

    #[tokio::test]
    async fn first_search_fetches_once_then_serves_cache() {
        let h = harness(MockCatalog::new(MockResponse::Page(page(&["a", "b"]))));
        let criteria = SearchCriteria::default().title("graph neural networks");

        let first = h.gateway.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(h.catalog.query_calls(), 1);
        assert_eq!(h.store.cache_writes(), 1);

        let second = h.gateway.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(h.catalog.query_calls(), 1);
        assert_eq!(h.store.cache_writes(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_both_fetch_and_write() {
        let h = harness(
            MockCatalog::new(MockResponse::Page(page(&["a"])))
                .with_delay(Duration::from_millis(50)),
        );
        let criteria = SearchCriteria::default().title("attention");

        let (first, second) = tokio::join!(
            h.gateway.search(&criteria, 0, 10),
            h.gateway.search(&criteria, 0, 10)
        );
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(h.catalog.query_calls(), 2);
        assert_eq!(h.store.cache_writes(), 2);
        assert_eq!(h.store.cache_len(), 1);

        h.gateway.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(h.catalog.query_calls(), 2);
        assert_eq!(h.store.cache_writes(), 2);
    }

    #[tokio::test]
    async fn legacy_id_record_cached_under_normalized_key() {
        let h = harness(MockCatalog::new(MockResponse::Record(record("hep-th/9901001"))));
        h.gateway.fetch_by_id("hep-th/9901001").await.unwrap();
        assert!(h.store.get("id_hep-th_9901001").await.unwrap().is_some());
        assert!(h.store.get("id_hep-th/9901001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn paging_window_passed_through() {
        let h = harness(MockCatalog::new(MockResponse::Page(page(&["a"]))));
        let criteria = SearchCriteria::default().author("Yann LeCun");
        h.gateway.search(&criteria, 30, 15).await.unwrap();
        assert_eq!(
            h.catalog.last_query(),
            Some(("au:Yann_LeCun".to_string(), 30, 15))
        );
    }

    #[tokio::test]
    async fn expired_entry_is_refetched_and_rewritten() {
        let h = harness(MockCatalog::with_sequence(vec![
            MockResponse::Page(page(&["old"])),
            MockResponse::Page(page(&["new"])),
        ]));
        let criteria = SearchCriteria::default().category("math.CO");

        h.gateway.search(&criteria, 0, 10).await.unwrap();
        h.clock.advance(chrono::Duration::hours(23));
        h.gateway.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(h.catalog.query_calls(), 1);

        h.clock.advance(chrono::Duration::hours(1));
        let refreshed = h.gateway.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(h.catalog.query_calls(), 2);
        assert_eq!(refreshed.items[0].id, "new");

        let key = search_key("cat:math.CO", 0, 10);
        let entry = h.store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.cached_at, h.clock.now());
    }

    #[tokio::test]
    async fn custom_ttl_respected() {
        let h = harness(MockCatalog::new(MockResponse::Page(page(&["a"]))));
        let gateway = SearchGateway::new(h.catalog.clone(), h.store.clone())
            .with_clock(h.clock.clone())
            .with_search_ttl(Duration::from_secs(60));
        gateway.search_query("all", 0, 10).await.unwrap();
        h.clock.advance(chrono::Duration::seconds(61));
        gateway.search_query("all", 0, 10).await.unwrap();
        assert_eq!(h.catalog.query_calls(), 2);
    }

    #[tokio::test]
    async fn stale_entry_not_served_when_upstream_fails() {
        let h = harness(MockCatalog::with_sequence(vec![
            MockResponse::Page(page(&["a"])),
            MockResponse::Status(503),
        ]));
        h.gateway.search_query("all", 0, 10).await.unwrap();
        h.clock.advance(chrono::Duration::days(2));

        let err = h.gateway.search_query("all", 0, 10).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Catalog(CatalogError::Status(503))));
        // The old entry is left exactly as it was.
        let entry = h.store.get(&search_key("all", 0, 10)).await.unwrap().unwrap();
        assert_eq!(entry.cached_at, h.clock.now() - chrono::Duration::days(2));
        assert_eq!(h.store.cache_writes(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let h = harness(MockCatalog::new(MockResponse::Error("truncated".into())));
        assert!(h.gateway.search_query("all", 0, 10).await.is_err());
        assert_eq!(h.store.cache_len(), 0);
    }

    #[tokio::test]
    async fn record_never_refetched() {
        let h = harness(MockCatalog::new(MockResponse::Record(record("1706.03762"))));
        let first = h.gateway.fetch_by_id("1706.03762").await.unwrap();
        h.clock.advance(chrono::Duration::days(365));
        let second = h.gateway.fetch_by_id("arXiv:1706.03762").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.catalog.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn empty_feed_is_not_found() {
        let h = harness(MockCatalog::new(MockResponse::NotFound));
        let err = h.gateway.fetch_by_id("9999.99999").await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(id) if id == "9999.99999"));
        assert_eq!(h.store.cache_len(), 0);
    }

    #[tokio::test]
    async fn id_prefix_routes_to_lookup() {
        let h = harness(MockCatalog::new(MockResponse::Record(record("cond-mat/0102536"))));
        let page = h.gateway.search_query("id:cond-mat/0102536", 0, 10).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_results, 1);
        assert_eq!(h.catalog.fetch_calls(), 1);
        assert_eq!(h.catalog.query_calls(), 0);
    }

    #[tokio::test]
    async fn blank_raw_query_matches_all() {
        let h = harness(MockCatalog::new(MockResponse::Page(page(&[]))));
        h.gateway.search_query("   ", 0, 5).await.unwrap();
        assert_eq!(h.catalog.last_query(), Some(("all".to_string(), 0, 5)));
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_passthrough() {
        let catalog = Arc::new(MockCatalog::new(MockResponse::Page(page(&["a"]))));
        let gateway = SearchGateway::new(catalog.clone(), Arc::new(BrokenCache));

        let result = gateway.search_query("all", 0, 10).await.unwrap();
        assert_eq!(result.items.len(), 1);
        gateway.search_query("all", 0, 10).await.unwrap();
        assert_eq!(catalog.query_calls(), 2);
    }
}

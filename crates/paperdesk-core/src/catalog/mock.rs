//! Mock catalog for testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CatalogClient, CatalogError, CatalogFuture};
use crate::record::{Record, RecordPage};

/// A configurable mock response for [`MockCatalog`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Answer with this page (or its first item for id lookups).
    Page(RecordPage),
    /// Answer with a single record (a one-item page for queries).
    Record(Record),
    /// Empty feed.
    NotFound,
    /// Simulate a non-success HTTP status.
    Status(u16),
    /// Simulate an unparsable feed.
    Error(String),
}

/// A hand-rolled mock implementing [`CatalogClient`] for tests.
///
/// Supports a fixed response or a sequence (one per call, repeating the
/// last), optional per-call latency, and call counting for both operations.
pub struct MockCatalog {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    query_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    last_query: Mutex<Option<(String, u32, u32)>>,
}

impl MockCatalog {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            query_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses.last().cloned().unwrap_or(MockResponse::NotFound);
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            ..Self::new(fallback)
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `query()` has been called.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// How many times `fetch_by_id()` has been called.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent `query()` call.
    pub fn last_query(&self) -> Option<(String, u32, u32)> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }

    fn next_response(&self) -> MockResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }

    async fn respond(&self) -> Result<MockResponse, CatalogError> {
        let response = self.next_response();
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match response {
            MockResponse::Status(code) => Err(CatalogError::Status(code)),
            MockResponse::Error(msg) => Err(CatalogError::Parse(msg)),
            other => Ok(other),
        }
    }
}

impl CatalogClient for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    fn query<'a>(
        &'a self,
        query: &'a str,
        offset: u32,
        page_size: u32,
    ) -> CatalogFuture<'a, RecordPage> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some((query.to_string(), offset, page_size));
        }

        Box::pin(async move {
            Ok(match self.respond().await? {
                MockResponse::Page(page) => page,
                MockResponse::Record(record) => RecordPage {
                    items: vec![record],
                    total_results: 1,
                    start_index: u64::from(offset),
                    items_per_page: u64::from(page_size),
                },
                _ => RecordPage::default(),
            })
        })
    }

    fn fetch_by_id<'a>(&'a self, _id: &'a str) -> CatalogFuture<'a, Option<Record>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            Ok(match self.respond().await? {
                MockResponse::Page(page) => page.items.into_iter().next(),
                MockResponse::Record(record) => Some(record),
                _ => None,
            })
        })
    }
}

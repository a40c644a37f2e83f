//! Upstream catalog client trait and implementations.

pub mod arxiv;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::record::{Record, RecordPage};

pub use arxiv::ArxivClient;

/// Boxed future returned by [`CatalogClient`] methods.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned HTTP {0}")]
    Status(u16),
    #[error("failed to parse catalog feed: {0}")]
    Parse(String),
    #[error("catalog rejected the request: {0}")]
    Api(String),
}

/// The upstream scholarly catalog.
///
/// Implementations return normalized records; single-entry and multi-entry
/// feeds both come back as sequences.
pub trait CatalogClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run a catalog query. `offset` and `page_size` are passed through verbatim.
    fn query<'a>(
        &'a self,
        query: &'a str,
        offset: u32,
        page_size: u32,
    ) -> CatalogFuture<'a, RecordPage>;

    /// Look up one record by identifier. `Ok(None)` when the catalog has no such record.
    fn fetch_by_id<'a>(&'a self, id: &'a str) -> CatalogFuture<'a, Option<Record>>;
}

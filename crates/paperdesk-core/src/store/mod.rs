//! Durable key/value and document storage behind the gateway and collections.
//!
//! Three narrow traits describe what the components need from the backing
//! store: timestamped cache entries ([`CacheStore`]), owner-partitioned
//! collection documents ([`CollectionBackend`]) and subscriptions
//! ([`SubscriptionBackend`]). [`SqliteStore`] persists all of them;
//! [`MemoryStore`] is the process-local stand-in used when no database path is
//! configured and in tests.

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collections::CollectionKind;
use crate::record::{Record, RecordPage};
use crate::subscriptions::Subscription;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Separator that may appear in catalog identifiers but not in storage keys.
pub const PATH_SEPARATOR: char = '/';
/// What [`PATH_SEPARATOR`] becomes inside a storage key.
pub const KEY_PLACEHOLDER: char = '_';

/// Storage form of a catalog identifier: surrounding whitespace trimmed and
/// every `/` replaced with `_`.
pub fn normalize_key(id: &str) -> String {
    id.trim().replace(PATH_SEPARATOR, &KEY_PLACEHOLDER.to_string())
}

/// What a cache entry holds: a page of search results or one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachePayload {
    Page(RecordPage),
    Record(Record),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: CachePayload,
    /// Time of the write that produced `payload`.
    pub cached_at: DateTime<Utc>,
}

/// Timestamped key/value storage for cached catalog responses.
///
/// `put` overwrites unconditionally; freshness is decided by the reader.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CacheEntry>>;

    fn put<'a>(
        &'a self,
        key: &'a str,
        payload: &'a CachePayload,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()>;
}

/// A collection document as persisted, keyed by its normalized storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub key: String,
    pub title: String,
    pub authors: Vec<String>,
    pub added_at: DateTime<Utc>,
}

/// Result of a bounded upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// The key already existed; its fields were overwritten.
    Updated,
    /// The key was new and the collection was full. Nothing was written.
    Rejected { count: usize },
}

/// Owner/kind-partitioned document storage for collections.
pub trait CollectionBackend: Send + Sync {
    /// Items ordered by `added_at`, newest first, at most `limit` of them.
    fn list<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        limit: usize,
    ) -> StoreFuture<'a, Vec<StoredItem>>;

    fn get_item<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, Option<StoredItem>>;

    /// Overwrite `item` if its key exists, otherwise insert it unless the
    /// partition already holds `limit` items. The existence check, the count
    /// and the write happen atomically.
    fn upsert_bounded<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        item: StoredItem,
        limit: usize,
    ) -> StoreFuture<'a, UpsertOutcome>;

    /// Returns whether a document was deleted.
    fn delete<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, bool>;

    fn count<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize>;

    /// Delete every document in the partition, returning how many were removed.
    fn clear<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize>;
}

/// Per-owner subscription documents.
pub trait SubscriptionBackend: Send + Sync {
    /// Subscriptions ordered by creation time, oldest first.
    fn list_subscriptions<'a>(&'a self, owner: &'a str) -> StoreFuture<'a, Vec<Subscription>>;

    fn insert_subscription<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()>;

    fn delete_subscription<'a>(&'a self, owner: &'a str, id: &'a str) -> StoreFuture<'a, bool>;
}

/// Handles to one backing store, as the three component-facing traits.
#[derive(Clone)]
pub struct Backend {
    pub cache: Arc<dyn CacheStore>,
    pub collections: Arc<dyn CollectionBackend>,
    pub subscriptions: Arc<dyn SubscriptionBackend>,
    persistent: bool,
}

impl Backend {
    pub fn from_store<S>(store: Arc<S>, persistent: bool) -> Self
    where
        S: CacheStore + CollectionBackend + SubscriptionBackend + 'static,
    {
        Self {
            cache: store.clone(),
            collections: store.clone(),
            subscriptions: store,
            persistent,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()), false)
    }

    /// Whether this backend survives a process restart.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

/// Build a [`Backend`] from an optional database path.
///
/// If `path` is set, opens a persistent SQLite store (creating the parent
/// directory). Otherwise, or if opening fails, returns an in-memory store.
pub fn build_backend(path: Option<&Path>) -> Backend {
    if let Some(path) = path {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            let _ = std::fs::create_dir_all(parent);
        }
        match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "opened persistent store");
                return Backend::from_store(Arc::new(store), true);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open store, falling back to in-memory");
            }
        }
    }
    Backend::in_memory()
}

static GLOBAL_BACKEND: OnceCell<Backend> = OnceCell::new();

/// Process-wide backend, built from `path` on first call and reused after.
///
/// Later calls ignore `path`. Components take the returned [`Backend`] (or
/// one of its handles) as a constructor argument rather than calling this.
pub fn global_backend(path: Option<&Path>) -> Backend {
    GLOBAL_BACKEND.get_or_init(|| build_backend(path)).clone()
}

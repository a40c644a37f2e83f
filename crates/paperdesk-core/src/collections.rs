//! Bounded per-user collections: favorites and reading history.
//!
//! Items are keyed by their catalog identifier. Identifiers may contain `/`
//! (legacy arXiv ids such as `hep-th/9901001`), which is not allowed in a
//! storage key, so every `/` is replaced with `_` on the way in and restored
//! on the way out. Identifiers that already contain `_` are rejected: they
//! would decode to a different id than the one stored.
//!
//! Capacity is enforced at insert time. A full collection rejects new items;
//! nothing is ever evicted to make room.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::store::{
    CollectionBackend, KEY_PLACEHOLDER, PATH_SEPARATOR, StoreError, StoredItem, UpsertOutcome,
    normalize_key,
};

pub const FAVORITES_LIMIT: usize = 100;
pub const HISTORY_LIMIT: usize = 1000;

/// Hard cap on how many items one `list` call returns.
pub const MAX_LIST_LIMIT: usize = 200;
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Favorites,
    History,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::History => "history",
        }
    }

    /// Maximum number of items an owner may hold in this collection.
    pub fn capacity(self) -> usize {
        match self {
            CollectionKind::Favorites => FAVORITES_LIMIT,
            CollectionKind::History => HISTORY_LIMIT,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "favorites" => Ok(CollectionKind::Favorites),
            "history" => Ok(CollectionKind::History),
            other => Err(format!("unknown collection {other:?}")),
        }
    }
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("{}", capacity_message(*.kind, *.limit))]
    CapacityExceeded { kind: CollectionKind, limit: usize },
    #[error("{item_id} is not in {kind}")]
    NotFound { kind: CollectionKind, item_id: String },
    #[error("invalid item id {0:?}")]
    InvalidItemId(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

fn capacity_message(kind: CollectionKind, limit: usize) -> String {
    match kind {
        CollectionKind::Favorites => {
            format!("Favorites limit of {limit} reached. Remove some before adding more.")
        }
        CollectionKind::History => {
            format!("History limit of {limit} reached. Please clear some entries first.")
        }
    }
}

/// An item in a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub owner_id: String,
    /// Raw catalog identifier, separators intact.
    pub item_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub added_at: DateTime<Utc>,
}

/// What a caller supplies when adding to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(rename = "id")]
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl NewItem {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            authors,
        }
    }
}

/// Whether an upsert created a new item or edited an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Updated,
}

/// Map a catalog identifier to its storage key. Surrounding whitespace is
/// not part of the identifier.
pub fn storage_key(item_id: &str) -> Result<String, CollectionError> {
    let trimmed = item_id.trim();
    if trimmed.is_empty() || trimmed.contains(KEY_PLACEHOLDER) {
        return Err(CollectionError::InvalidItemId(item_id.to_string()));
    }
    Ok(normalize_key(trimmed))
}

/// Inverse of [`storage_key`].
pub fn item_id_from_key(key: &str) -> String {
    key.replace(KEY_PLACEHOLDER, &PATH_SEPARATOR.to_string())
}

/// Per-user favorites and history on top of a [`CollectionBackend`].
#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn CollectionBackend>,
    clock: Arc<dyn Clock>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn CollectionBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Newest-first items, at most `limit` (default 50, never more than 200).
    pub async fn list(
        &self,
        owner: &str,
        kind: CollectionKind,
        limit: Option<usize>,
    ) -> Result<Vec<CollectionItem>, CollectionError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        let items = self.backend.list(owner, kind, limit).await?;
        Ok(items
            .into_iter()
            .map(|item| to_collection_item(owner, item))
            .collect())
    }

    /// A single item. Unlike [`remove`](Self::remove), absence is an error here.
    pub async fn get(
        &self,
        owner: &str,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<CollectionItem, CollectionError> {
        let key = storage_key(item_id)?;
        self.backend
            .get_item(owner, kind, &key)
            .await?
            .map(|item| to_collection_item(owner, item))
            .ok_or_else(|| CollectionError::NotFound {
                kind,
                item_id: item_id.to_string(),
            })
    }

    /// Add `item`, or refresh it if already present.
    ///
    /// Refreshing an existing item overwrites its title, authors and timestamp
    /// and does not count against capacity. A new item on a full collection
    /// fails with [`CollectionError::CapacityExceeded`] and writes nothing.
    pub async fn upsert(
        &self,
        owner: &str,
        kind: CollectionKind,
        item: NewItem,
    ) -> Result<Upserted, CollectionError> {
        let key = storage_key(&item.item_id)?;
        let limit = kind.capacity();
        let stored = StoredItem {
            key,
            title: item.title,
            authors: item.authors,
            added_at: self.clock.now(),
        };

        match self.backend.upsert_bounded(owner, kind, stored, limit).await? {
            UpsertOutcome::Inserted => Ok(Upserted::Inserted),
            UpsertOutcome::Updated => Ok(Upserted::Updated),
            UpsertOutcome::Rejected { count } => {
                tracing::debug!(owner, %kind, count, limit, "collection full");
                Err(CollectionError::CapacityExceeded { kind, limit })
            }
        }
    }

    /// Remove an item. Removing something that isn't there succeeds.
    pub async fn remove(
        &self,
        owner: &str,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<(), CollectionError> {
        let key = storage_key(item_id)?;
        if !self.backend.delete(owner, kind, &key).await? {
            tracing::trace!(owner, %kind, item_id, "remove of absent item");
        }
        Ok(())
    }

    pub async fn count(&self, owner: &str, kind: CollectionKind) -> Result<usize, CollectionError> {
        Ok(self.backend.count(owner, kind).await?)
    }

    /// Empty the collection, returning how many items were removed.
    pub async fn clear(&self, owner: &str, kind: CollectionKind) -> Result<usize, CollectionError> {
        Ok(self.backend.clear(owner, kind).await?)
    }

    pub async fn list_favorites(
        &self,
        owner: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectionItem>, CollectionError> {
        self.list(owner, CollectionKind::Favorites, limit).await
    }

    pub async fn add_favorite(&self, owner: &str, item: NewItem) -> Result<Upserted, CollectionError> {
        self.upsert(owner, CollectionKind::Favorites, item).await
    }

    pub async fn remove_favorite(&self, owner: &str, item_id: &str) -> Result<(), CollectionError> {
        self.remove(owner, CollectionKind::Favorites, item_id).await
    }

    pub async fn list_history(
        &self,
        owner: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectionItem>, CollectionError> {
        self.list(owner, CollectionKind::History, limit).await
    }

    pub async fn add_history_entry(
        &self,
        owner: &str,
        item: NewItem,
    ) -> Result<Upserted, CollectionError> {
        self.upsert(owner, CollectionKind::History, item).await
    }

    pub async fn remove_history_entry(
        &self,
        owner: &str,
        item_id: &str,
    ) -> Result<(), CollectionError> {
        self.remove(owner, CollectionKind::History, item_id).await
    }
}

fn to_collection_item(owner: &str, item: StoredItem) -> CollectionItem {
    CollectionItem {
        owner_id: owner.to_string(),
        item_id: item_id_from_key(&item.key),
        title: item.title,
        authors: item.authors,
        added_at: item.added_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn store_with_clock() -> (CollectionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        let store = CollectionStore::new(Arc::new(MemoryStore::new())).with_clock(clock.clone());
        (store, clock)
    }

    fn paper(id: &str) -> NewItem {
        NewItem::new(id, format!("Paper {id}"), vec!["Ada Lovelace".into()])
    }

    #[test]
    fn storage_key_replaces_separators() {
        assert_eq!(storage_key("hep-th/9901001").unwrap(), "hep-th_9901001");
        assert_eq!(storage_key("2101.00001v2").unwrap(), "2101.00001v2");
        assert_eq!(item_id_from_key("hep-th_9901001"), "hep-th/9901001");
    }

    #[test]
    fn storage_key_ignores_surrounding_whitespace() {
        assert_eq!(storage_key(" 2101.00001\t").unwrap(), "2101.00001");
        assert_eq!(storage_key(" hep-th/9901001 ").unwrap(), "hep-th_9901001");
        assert!(matches!(storage_key("   "), Err(CollectionError::InvalidItemId(_))));
    }

    #[test]
    fn storage_key_rejects_placeholder() {
        assert!(matches!(
            storage_key("weird_id"),
            Err(CollectionError::InvalidItemId(_))
        ));
        assert!(matches!(storage_key(""), Err(CollectionError::InvalidItemId(_))));
    }

    #[test]
    fn capacity_message_is_user_actionable() {
        let err = CollectionError::CapacityExceeded {
            kind: CollectionKind::Favorites,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Favorites limit of 100 reached. Remove some before adding more."
        );
    }

    #[test]
    fn kind_parses() {
        assert_eq!("history".parse::<CollectionKind>(), Ok(CollectionKind::History));
        assert!("bookmarks".parse::<CollectionKind>().is_err());
    }

    #[tokio::test]
    async fn separator_round_trips_through_list() {
        let (store, _clock) = store_with_clock();
        store.add_favorite("u1", paper("math/0211159")).await.unwrap();
        let items = store.list_favorites("u1", None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "math/0211159");
        assert_eq!(items[0].owner_id, "u1");
        assert_eq!(items[0].authors, vec!["Ada Lovelace"]);
    }

    #[tokio::test]
    async fn padded_id_is_the_same_item() {
        let (store, _clock) = store_with_clock();
        assert_eq!(
            store.add_favorite("u1", paper(" 2101.00001")).await.unwrap(),
            Upserted::Inserted
        );
        assert_eq!(
            store.add_favorite("u1", paper("2101.00001")).await.unwrap(),
            Upserted::Updated
        );
        assert_eq!(store.count("u1", CollectionKind::Favorites).await.unwrap(), 1);
        let item = store.get("u1", CollectionKind::Favorites, "2101.00001 ").await.unwrap();
        assert_eq!(item.item_id, "2101.00001");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (store, clock) = store_with_clock();
        for id in ["1111.0001", "1111.0002", "1111.0003"] {
            store.add_history_entry("u1", paper(id)).await.unwrap();
            clock.advance(Duration::minutes(1));
        }
        let ids: Vec<_> = store
            .list_history("u1", None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.item_id)
            .collect();
        assert_eq!(ids, vec!["1111.0003", "1111.0002", "1111.0001"]);
    }

    #[tokio::test]
    async fn list_limit_is_capped() {
        let (store, clock) = store_with_clock();
        for i in 0..(MAX_LIST_LIMIT + 5) {
            store
                .add_history_entry("u1", paper(&format!("2301.{i:05}")))
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
        assert_eq!(
            store.list_history("u1", Some(10_000)).await.unwrap().len(),
            MAX_LIST_LIMIT
        );
        assert_eq!(
            store.list_history("u1", None).await.unwrap().len(),
            DEFAULT_LIST_LIMIT
        );
        assert_eq!(store.list_history("u1", Some(3)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn favorites_reject_past_capacity() {
        let (store, _clock) = store_with_clock();
        for i in 0..FAVORITES_LIMIT {
            store
                .add_favorite("u1", paper(&format!("2402.{i:05}")))
                .await
                .unwrap();
        }
        let err = store
            .add_favorite("u1", paper("2402.99999"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectionError::CapacityExceeded {
                kind: CollectionKind::Favorites,
                limit: FAVORITES_LIMIT
            }
        ));
        assert_eq!(
            store.count("u1", CollectionKind::Favorites).await.unwrap(),
            FAVORITES_LIMIT
        );
        // Another owner is unaffected.
        assert!(store.add_favorite("u2", paper("2402.99999")).await.is_ok());
    }

    #[tokio::test]
    async fn upsert_existing_updates_in_place() {
        let (store, clock) = store_with_clock();
        store.add_favorite("u1", paper("cs/0101001")).await.unwrap();
        clock.advance(Duration::hours(1));
        let outcome = store
            .add_favorite(
                "u1",
                NewItem::new("cs/0101001", "Renamed", vec!["Grace Hopper".into()]),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(store.count("u1", CollectionKind::Favorites).await.unwrap(), 1);

        let item = store
            .get("u1", CollectionKind::Favorites, "cs/0101001")
            .await
            .unwrap();
        assert_eq!(item.title, "Renamed");
        assert_eq!(item.authors, vec!["Grace Hopper"]);
        assert_eq!(item.added_at, clock.now());
    }

    #[tokio::test]
    async fn upsert_existing_allowed_at_capacity() {
        let (store, _clock) = store_with_clock();
        for i in 0..FAVORITES_LIMIT {
            store
                .add_favorite("u1", paper(&format!("2402.{i:05}")))
                .await
                .unwrap();
        }
        let outcome = store.add_favorite("u1", paper("2402.00007")).await.unwrap();
        assert_eq!(outcome, Upserted::Updated);
    }

    #[tokio::test]
    async fn removing_absent_item_succeeds() {
        let (store, _clock) = store_with_clock();
        assert!(store.remove_favorite("u1", "0000.00000").await.is_ok());
    }

    #[tokio::test]
    async fn remove_uses_normalized_key() {
        let (store, _clock) = store_with_clock();
        store.add_history_entry("u1", paper("q-bio/0401001")).await.unwrap();
        store.remove_history_entry("u1", "q-bio/0401001").await.unwrap();
        assert_eq!(store.count("u1", CollectionKind::History).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _clock) = store_with_clock();
        let err = store
            .get("u1", CollectionKind::History, "2101.00001")
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_id_writes_nothing() {
        let (store, _clock) = store_with_clock();
        let err = store.add_favorite("u1", paper("has_underscore")).await.unwrap_err();
        assert!(matches!(err, CollectionError::InvalidItemId(_)));
        assert_eq!(store.count("u1", CollectionKind::Favorites).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_empties_collection() {
        let (store, _clock) = store_with_clock();
        store.add_history_entry("u1", paper("1234.5678")).await.unwrap();
        store.add_history_entry("u1", paper("1234.5679")).await.unwrap();
        assert_eq!(store.clear("u1", CollectionKind::History).await.unwrap(), 2);
        assert!(store.list_history("u1", None).await.unwrap().is_empty());
    }
}

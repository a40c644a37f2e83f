//! In-memory store backed by [`DashMap`].
//!
//! Nothing survives a restart. Bounded upserts hold the partition's shard
//! lock for the whole check-and-write, so they are atomic with respect to
//! each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{
    CacheEntry, CachePayload, CacheStore, CollectionBackend, StoreFuture, StoredItem,
    SubscriptionBackend, UpsertOutcome,
};
use crate::collections::CollectionKind;
use crate::subscriptions::Subscription;

type PartitionKey = (String, CollectionKind);

#[derive(Default)]
pub struct MemoryStore {
    cache: DashMap<String, CacheEntry>,
    collections: DashMap<PartitionKey, HashMap<String, StoredItem>>,
    subscriptions: DashMap<String, Vec<Subscription>>,
    cache_reads: AtomicU64,
    cache_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache `get` calls since creation.
    pub fn cache_reads(&self) -> u64 {
        self.cache_reads.load(Ordering::Relaxed)
    }

    /// Number of cache `put` calls since creation.
    pub fn cache_writes(&self) -> u64 {
        self.cache_writes.load(Ordering::Relaxed)
    }

    /// Number of cache entries held.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn partition(owner: &str, kind: CollectionKind) -> PartitionKey {
        (owner.to_string(), kind)
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CacheEntry>> {
        self.cache_reads.fetch_add(1, Ordering::Relaxed);
        let entry = self.cache.get(key).map(|e| e.value().clone());
        Box::pin(async move { Ok(entry) })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        payload: &'a CachePayload,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()> {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload: payload.clone(),
                cached_at: at,
            },
        );
        Box::pin(async { Ok(()) })
    }
}

impl CollectionBackend for MemoryStore {
    fn list<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        limit: usize,
    ) -> StoreFuture<'a, Vec<StoredItem>> {
        let mut items: Vec<StoredItem> = self
            .collections
            .get(&Self::partition(owner, kind))
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at).then_with(|| a.key.cmp(&b.key)));
        items.truncate(limit);
        Box::pin(async move { Ok(items) })
    }

    fn get_item<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, Option<StoredItem>> {
        let item = self
            .collections
            .get(&Self::partition(owner, kind))
            .and_then(|p| p.get(key).cloned());
        Box::pin(async move { Ok(item) })
    }

    fn upsert_bounded<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        item: StoredItem,
        limit: usize,
    ) -> StoreFuture<'a, UpsertOutcome> {
        let outcome = {
            let mut partition = self
                .collections
                .entry(Self::partition(owner, kind))
                .or_default();
            if let Some(existing) = partition.get_mut(&item.key) {
                *existing = item;
                UpsertOutcome::Updated
            } else if partition.len() >= limit {
                UpsertOutcome::Rejected {
                    count: partition.len(),
                }
            } else {
                partition.insert(item.key.clone(), item);
                UpsertOutcome::Inserted
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn delete<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, bool> {
        let deleted = self
            .collections
            .get_mut(&Self::partition(owner, kind))
            .map(|mut p| p.remove(key).is_some())
            .unwrap_or(false);
        Box::pin(async move { Ok(deleted) })
    }

    fn count<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize> {
        let count = self
            .collections
            .get(&Self::partition(owner, kind))
            .map(|p| p.len())
            .unwrap_or(0);
        Box::pin(async move { Ok(count) })
    }

    fn clear<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize> {
        let removed = self
            .collections
            .remove(&Self::partition(owner, kind))
            .map(|(_, p)| p.len())
            .unwrap_or(0);
        Box::pin(async move { Ok(removed) })
    }
}

impl SubscriptionBackend for MemoryStore {
    fn list_subscriptions<'a>(&'a self, owner: &'a str) -> StoreFuture<'a, Vec<Subscription>> {
        let mut subs = self
            .subscriptions
            .get(owner)
            .map(|s| s.value().clone())
            .unwrap_or_default();
        subs.sort_by_key(|s| s.created_at);
        Box::pin(async move { Ok(subs) })
    }

    fn insert_subscription<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()> {
        let mut subs = self
            .subscriptions
            .entry(subscription.owner_id.clone())
            .or_default();
        subs.retain(|s| s.id != subscription.id);
        subs.push(subscription.clone());
        drop(subs);
        Box::pin(async { Ok(()) })
    }

    fn delete_subscription<'a>(&'a self, owner: &'a str, id: &'a str) -> StoreFuture<'a, bool> {
        let deleted = self
            .subscriptions
            .get_mut(owner)
            .map(|mut subs| {
                let before = subs.len();
                subs.retain(|s| s.id != id);
                subs.len() < before
            })
            .unwrap_or(false);
        Box::pin(async move { Ok(deleted) })
    }
}

//! SQLite-backed store.
//!
//! Writes go through a single writer connection behind a [`Mutex`]; reads use
//! a pool of read-only connections (WAL mode allows them to run alongside the
//! writer). All SQLite work runs on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};

use super::{
    CacheEntry, CachePayload, CacheStore, CollectionBackend, StoreError, StoreFuture, StoredItem,
    SubscriptionBackend, UpsertOutcome,
};
use crate::collections::CollectionKind;
use crate::subscriptions::Subscription;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key        TEXT PRIMARY KEY,
    payload    TEXT NOT NULL,
    cached_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS collection_items (
    owner_id   TEXT NOT NULL,
    kind       TEXT NOT NULL,
    item_key   TEXT NOT NULL,
    title      TEXT NOT NULL,
    authors    TEXT NOT NULL,
    added_at   INTEGER NOT NULL,
    PRIMARY KEY (owner_id, kind, item_key)
);

CREATE INDEX IF NOT EXISTS idx_collection_items_added
    ON collection_items (owner_id, kind, added_at DESC);

CREATE TABLE IF NOT EXISTS subscriptions (
    id         TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL,
    category   TEXT NOT NULL,
    keywords   TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_owner
    ON subscriptions (owner_id, created_at);
";

/// Open a SQLite connection with standard pragmas.
fn open_sqlite(path: &Path, read_only: bool) -> Result<Connection, rusqlite::Error> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn = Connection::open_with_flags(path, flags)?;
    if read_only {
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
    } else {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
    }
    Ok(conn)
}

/// Pool of read-only SQLite connections.
///
/// Connections are returned to the pool after use. If the pool is empty, a
/// new connection is opened.
struct ReadPool {
    pool: Mutex<Vec<Connection>>,
    path: PathBuf,
}

impl ReadPool {
    fn new(path: &Path) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            path: path.to_path_buf(),
        }
    }

    fn acquire(&self) -> Result<Connection, rusqlite::Error> {
        if let Ok(mut pool) = self.pool.lock()
            && let Some(conn) = pool.pop()
        {
            return Ok(conn);
        }
        open_sqlite(&self.path, true)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.push(conn);
        }
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.acquire()?;
        let result = f(&conn);
        self.release(conn);
        result
    }
}

struct Inner {
    writer: Mutex<Connection>,
    readers: ReadPool,
}

impl Inner {
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self
            .writer
            .lock()
            .map_err(|_| StoreError::Task("writer connection poisoned".into()))?;
        f(&mut conn)
    }
}

/// Persistent store for cache entries, collections and subscriptions.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let writer = open_sqlite(path, false)?;
        writer.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(writer),
                readers: ReadPool::new(path),
            }),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Inner) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_item(
    (key, title, authors, added_at): (String, String, String, i64),
) -> Result<StoredItem, StoreError> {
    Ok(StoredItem {
        key,
        title,
        authors: serde_json::from_str(&authors)?,
        added_at: from_millis(added_at),
    })
}

impl CacheStore for SqliteStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CacheEntry>> {
        let key = key.to_string();
        Box::pin(self.run(move |inner| {
            inner.readers.with(|conn| {
                let row: Option<(String, i64)> = conn
                    .prepare_cached("SELECT payload, cached_at FROM cache_entries WHERE key = ?1")?
                    .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
                    .optional()?;
                row.map(|(payload, cached_at)| -> Result<CacheEntry, StoreError> {
                    Ok(CacheEntry {
                        payload: serde_json::from_str(&payload)?,
                        cached_at: from_millis(cached_at),
                        key: key.clone(),
                    })
                })
                .transpose()
            })
        }))
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        payload: &'a CachePayload,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()> {
        let key = key.to_string();
        let payload = payload.clone();
        Box::pin(self.run(move |inner| {
            let payload = serde_json::to_string(&payload)?;
            inner.write(|conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO cache_entries (key, payload, cached_at)
                     VALUES (?1, ?2, ?3)",
                    params![key, payload, to_millis(at)],
                )?;
                Ok(())
            })
        }))
    }
}

impl CollectionBackend for SqliteStore {
    fn list<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        limit: usize,
    ) -> StoreFuture<'a, Vec<StoredItem>> {
        let owner = owner.to_string();
        Box::pin(self.run(move |inner| {
            inner.readers.with(|conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT item_key, title, authors, added_at FROM collection_items
                     WHERE owner_id = ?1 AND kind = ?2
                     ORDER BY added_at DESC
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![owner, kind.as_str(), limit as i64], row_to_item)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter()
                    .map(decode_item)
                    .collect::<Result<Vec<_>, StoreError>>()
            })
        }))
    }

    fn get_item<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, Option<StoredItem>> {
        let owner = owner.to_string();
        let key = key.to_string();
        Box::pin(self.run(move |inner| {
            inner.readers.with(|conn| {
                conn.prepare_cached(
                    "SELECT item_key, title, authors, added_at FROM collection_items
                     WHERE owner_id = ?1 AND kind = ?2 AND item_key = ?3",
                )?
                .query_row(params![owner, kind.as_str(), key], row_to_item)
                .optional()?
                .map(decode_item)
                .transpose()
            })
        }))
    }

    fn upsert_bounded<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        item: StoredItem,
        limit: usize,
    ) -> StoreFuture<'a, UpsertOutcome> {
        let owner = owner.to_string();
        Box::pin(self.run(move |inner| {
            let authors = serde_json::to_string(&item.authors)?;
            inner.write(|conn| {
                // IMMEDIATE takes the write lock up front so the count
                // cannot change between the check and the insert.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let exists: bool = tx.query_row(
                    "SELECT COUNT(*) > 0 FROM collection_items
                     WHERE owner_id = ?1 AND kind = ?2 AND item_key = ?3",
                    params![owner, kind.as_str(), item.key],
                    |row| row.get(0),
                )?;

                let outcome = if exists {
                    tx.execute(
                        "UPDATE collection_items SET title = ?4, authors = ?5, added_at = ?6
                         WHERE owner_id = ?1 AND kind = ?2 AND item_key = ?3",
                        params![
                            owner,
                            kind.as_str(),
                            item.key,
                            item.title,
                            authors,
                            to_millis(item.added_at)
                        ],
                    )?;
                    UpsertOutcome::Updated
                } else {
                    let count: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM collection_items WHERE owner_id = ?1 AND kind = ?2",
                        params![owner, kind.as_str()],
                        |row| row.get(0),
                    )?;
                    let count = count as usize;
                    if count >= limit {
                        return Ok(UpsertOutcome::Rejected { count });
                    }
                    tx.execute(
                        "INSERT INTO collection_items
                             (owner_id, kind, item_key, title, authors, added_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            owner,
                            kind.as_str(),
                            item.key,
                            item.title,
                            authors,
                            to_millis(item.added_at)
                        ],
                    )?;
                    UpsertOutcome::Inserted
                };
                tx.commit()?;
                Ok(outcome)
            })
        }))
    }

    fn delete<'a>(
        &'a self,
        owner: &'a str,
        kind: CollectionKind,
        key: &'a str,
    ) -> StoreFuture<'a, bool> {
        let owner = owner.to_string();
        let key = key.to_string();
        Box::pin(self.run(move |inner| {
            inner.write(|conn| {
                let deleted = conn.execute(
                    "DELETE FROM collection_items
                     WHERE owner_id = ?1 AND kind = ?2 AND item_key = ?3",
                    params![owner, kind.as_str(), key],
                )?;
                Ok(deleted > 0)
            })
        }))
    }

    fn count<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize> {
        let owner = owner.to_string();
        Box::pin(self.run(move |inner| {
            inner.readers.with(|conn| {
                let count: i64 = conn
                    .prepare_cached(
                        "SELECT COUNT(*) FROM collection_items WHERE owner_id = ?1 AND kind = ?2",
                    )?
                    .query_row(params![owner, kind.as_str()], |row| row.get(0))?;
                Ok(count as usize)
            })
        }))
    }

    fn clear<'a>(&'a self, owner: &'a str, kind: CollectionKind) -> StoreFuture<'a, usize> {
        let owner = owner.to_string();
        Box::pin(self.run(move |inner| {
            inner.write(|conn| {
                Ok(conn.execute(
                    "DELETE FROM collection_items WHERE owner_id = ?1 AND kind = ?2",
                    params![owner, kind.as_str()],
                )?)
            })
        }))
    }
}

impl SubscriptionBackend for SqliteStore {
    fn list_subscriptions<'a>(&'a self, owner: &'a str) -> StoreFuture<'a, Vec<Subscription>> {
        let owner = owner.to_string();
        Box::pin(self.run(move |inner| {
            inner.readers.with(|conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, category, keywords, created_at FROM subscriptions
                     WHERE owner_id = ?1
                     ORDER BY created_at ASC",
                )?;
                let rows = stmt
                    .query_map(params![owner], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter()
                    .map(|(id, category, keywords, created_at)| {
                        Ok(Subscription {
                            id,
                            owner_id: owner.clone(),
                            category,
                            keywords: serde_json::from_str(&keywords)?,
                            created_at: from_millis(created_at),
                        })
                    })
                    .collect::<Result<Vec<_>, StoreError>>()
            })
        }))
    }

    fn insert_subscription<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()> {
        let sub = subscription.clone();
        Box::pin(self.run(move |inner| {
            let keywords = serde_json::to_string(&sub.keywords)?;
            inner.write(|conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO subscriptions
                         (id, owner_id, category, keywords, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        sub.id,
                        sub.owner_id,
                        sub.category,
                        keywords,
                        to_millis(sub.created_at)
                    ],
                )?;
                Ok(())
            })
        }))
    }

    fn delete_subscription<'a>(&'a self, owner: &'a str, id: &'a str) -> StoreFuture<'a, bool> {
        let owner = owner.to_string();
        let id = id.to_string();
        Box::pin(self.run(move |inner| {
            inner.write(|conn| {
                let deleted = conn.execute(
                    "DELETE FROM subscriptions WHERE owner_id = ?1 AND id = ?2",
                    params![owner, id],
                )?;
                Ok(deleted > 0)
            })
        }))
    }
}

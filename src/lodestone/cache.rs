// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request deduplicating response cache
//!
//! Every key maps to one entry carrying its own read/write lock. The first
//! caller for a missing or stale key inserts an unpopulated entry while
//! holding the table lock, takes the entry's write lock and runs the
//! expensive work; everybody arriving afterwards blocks on the entry's read
//! lock and receives the same payload. The table lock is only held for map
//! lookups and updates, never across the work itself.
//!
//! Failed populations are handed to the waiters of that cycle and then
//! dropped, so the next access retries. Capacity eviction removes the
//! populated entry with the oldest creation time using a linear scan, which
//! is fine for the few thousand entries this service keeps around. Entries
//! still being populated are never evicted, so a table full of in-flight
//! work may briefly hold more than its capacity.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Normalized identity of a read request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a GET of `url`
    ///
    /// Query parameters are sorted by name then value and re-encoded, and the
    /// fragment is dropped, so equivalent URLs share a key.
    pub fn for_get(url: &Url) -> Self {
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        pairs.sort();

        let mut normalized = url.clone();
        normalized.set_fragment(None);
        if pairs.is_empty() {
            normalized.set_query(None);
        } else {
            normalized.query_pairs_mut().clear().extend_pairs(&pairs);
        }

        Self(format!("GET {}", normalized))
    }

    /// Key from an already normalized string, such as a request URI
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Population state of an entry
enum Slot<V, E> {
    /// Created but not written yet. Seen by a reader only when the populating
    /// task was dropped before finishing.
    Pending,
    Ready(V),
    Failed(E),
}

struct CacheEntry<V, E> {
    created_at: Instant,
    max_age: Duration,
    slot: Arc<RwLock<Slot<V, E>>>,
}

impl<V, E> CacheEntry<V, E> {
    fn new(max_age: Duration) -> Self {
        Self {
            created_at: Instant::now(),
            max_age,
            slot: Arc::new(RwLock::new(Slot::Pending)),
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.created_at.elapsed() < max_age
    }
}

enum Lookup<V, E> {
    /// A fresh entry exists; wait on its read lock
    Follow(Arc<CacheEntry<V, E>>),
    /// A new entry was inserted and write-locked for the caller
    Lead(Arc<CacheEntry<V, E>>, OwnedRwLockWriteGuard<Slot<V, E>>),
    /// No entry could be claimed; run the work without caching it
    Bypass,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries in the table, including in-flight ones
    pub total: usize,
    /// Entries past their max age that have not been removed yet
    pub expired: usize,
    /// Capacity, `None` when unbounded
    pub max: Option<usize>,
}

/// Single-flight cache with per-access TTL and optional capacity bound
pub struct ResponseCache<V, E> {
    table: Mutex<HashMap<CacheKey, Arc<CacheEntry<V, E>>>>,
    max_entries: Option<usize>,
}

impl<V, E> ResponseCache<V, E>
where
    V: Clone,
    E: Clone,
{
    /// Create a cache holding at most `max_entries` keys; `0` means unbounded
    pub fn new(max_entries: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Serve `key` if younger than `max_age`, otherwise populate it with
    /// `on_miss`
    ///
    /// Exactly one `on_miss` runs per key per population cycle no matter how
    /// many callers race for it; all of them receive its result. Errors are
    /// returned to every waiter of that cycle but never stored.
    pub async fn access<F, Fut>(&self, key: &CacheKey, max_age: Duration, on_miss: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let (entry, mut slot) = loop {
            match self.lookup(key, max_age) {
                Lookup::Lead(entry, slot) => break (entry, slot),
                Lookup::Bypass => {
                    warn!(key = %key, "could not claim cache entry, bypassing cache");
                    return on_miss().await;
                }
                Lookup::Follow(entry) => {
                    let slot = entry.slot.read().await;
                    match &*slot {
                        Slot::Ready(value) => {
                            debug!(key = %key, "cache hit");
                            return Ok(value.clone());
                        }
                        Slot::Failed(err) => return Err(err.clone()),
                        Slot::Pending => {
                            // The populating task went away without writing
                            drop(slot);
                            debug!(key = %key, "abandoned cache entry, retrying");
                            self.remove_if_current(key, &entry);
                        }
                    }
                }
            }
        };

        debug!(key = %key, "cache miss");
        match on_miss().await {
            Ok(value) => {
                *slot = Slot::Ready(value.clone());
                Ok(value)
            }
            Err(err) => {
                *slot = Slot::Failed(err.clone());
                self.remove_if_current(key, &entry);
                drop(slot);
                Err(err)
            }
        }
    }

    fn lookup(&self, key: &CacheKey, max_age: Duration) -> Lookup<V, E> {
        let mut table = self.lock_table();

        if let Some(entry) = table.get(key) {
            if entry.is_fresh(max_age) {
                return Lookup::Follow(Arc::clone(entry));
            }
            debug!(key = %key, "removing stale cache entry");
            table.remove(key);
        }

        if let Some(max) = self.max_entries {
            if table.len() >= max {
                Self::evict_oldest(&mut table);
            }
        }

        // The entry is private until inserted, so its lock is always free here
        let entry = Arc::new(CacheEntry::new(max_age));
        let Ok(slot) = Arc::clone(&entry.slot).try_write_owned() else {
            return Lookup::Bypass;
        };
        table.insert(key.clone(), Arc::clone(&entry));

        Lookup::Lead(entry, slot)
    }

    /// Remove `key` only if it still maps to `entry`
    fn remove_if_current(&self, key: &CacheKey, entry: &Arc<CacheEntry<V, E>>) {
        let mut table = self.lock_table();
        if table
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, entry))
        {
            table.remove(key);
        }
    }

    /// Evict the populated entry with the oldest creation time
    ///
    /// An entry whose write lock is held is still being populated and has
    /// waiters depending on it, so it is skipped.
    fn evict_oldest(table: &mut HashMap<CacheKey, Arc<CacheEntry<V, E>>>) {
        if let Some(oldest_key) = table
            .iter()
            .filter(|(_, entry)| entry.slot.try_read().is_ok())
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone())
        {
            debug!(key = %oldest_key, "evicting oldest cache entry");
            table.remove(&oldest_key);
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<CacheEntry<V, E>>>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove entries that outlived the max age they were created with
    pub fn purge_expired(&self) -> usize {
        let mut table = self.lock_table();
        let before = table.len();
        table.retain(|_, entry| entry.is_fresh(entry.max_age));
        before - table.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let table = self.lock_table();
        CacheStats {
            total: table.len(),
            expired: table
                .values()
                .filter(|entry| !entry.is_fresh(entry.max_age))
                .count(),
            max: self.max_entries,
        }
    }
}

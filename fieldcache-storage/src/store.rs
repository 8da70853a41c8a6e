//! Expiring key-value store.
//!
//! The cache treats the store as a primitive: opaque string keys mapped to
//! type-erased values, each written with an absolute TTL. Expired entries are
//! invisible to [`ExpiringStore::try_get`] as soon as their deadline passes;
//! [`MemoryStore::purge_expired`] reclaims their memory.
//!
//! # Thread Safety
//!
//! Implementations must be safe to share across tasks. [`ExpiringStore::update`]
//! is the only read-modify-write primitive: it must be atomic with respect to
//! every other operation on the same store, so that several caches sharing
//! one store never lose each other's writes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use fieldcache_core::{CacheResult, StoreError};
use tokio::time::Instant;

/// Type-erased value held by a store entry.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

/// Computes a new value from the current live value, if any.
pub type StoreUpdate<'a> = Box<dyn FnOnce(Option<StoredValue>) -> StoredValue + 'a>;

/// Store trait for pluggable expiring key-value backends.
pub trait ExpiringStore: Send + Sync {
    /// Get a live value, or `None` if absent or expired.
    fn try_get(&self, key: &str) -> CacheResult<Option<StoredValue>>;

    /// Insert or replace a value. It expires `ttl` after this call.
    fn set(&self, key: &str, value: StoredValue, ttl: Duration) -> CacheResult<()>;

    /// Replace the value under `key` with `update(current)`, atomically.
    ///
    /// `current` is `None` if the key is absent or expired. The new value
    /// expires `ttl` after this call. `update` runs inside the store's
    /// exclusive section and must not call back into the store.
    fn update(&self, key: &str, ttl: Duration, update: StoreUpdate<'_>) -> CacheResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;
}

fn deadline(key: &str, ttl: Duration) -> CacheResult<Instant> {
    Instant::now().checked_add(ttl).ok_or_else(|| {
        StoreError::WriteFailed {
            key: key.to_string(),
            reason: format!("TTL {:?} overflows the clock", ttl),
        }
        .into()
    })
}

struct StoreEntry {
    value: StoredValue,
    expires_at: Instant,
}

impl StoreEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory expiring store.
///
/// Expiry is measured with `tokio::time::Instant`, so tests running on a
/// paused runtime can move time forward with `tokio::time::advance`.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> CacheResult<usize> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::trace!(purged, "Purged expired store entries");
        }
        Ok(purged)
    }
}

impl ExpiringStore for MemoryStore {
    fn try_get(&self, key: &str) -> CacheResult<Option<StoredValue>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.value)))
    }

    fn set(&self, key: &str, value: StoredValue, ttl: Duration) -> CacheResult<()> {
        let expires_at = deadline(key, ttl)?;
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), StoreEntry { value, expires_at });
        tracing::trace!(key, ?ttl, "Stored entry");
        Ok(())
    }

    fn update(&self, key: &str, ttl: Duration, update: StoreUpdate<'_>) -> CacheResult<()> {
        let expires_at = deadline(key, ttl)?;
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let now = Instant::now();
        let current = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.value));
        let value = update(current);
        entries.insert(key.to_string(), StoreEntry { value, expires_at });
        tracing::trace!(key, ?ttl, "Updated entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(n: u32) -> StoredValue {
        Arc::new(n)
    }

    fn read_u32(store: &MemoryStore, key: &str) -> Option<u32> {
        store
            .try_get(key)
            .expect("try_get should succeed")
            .and_then(|v| v.downcast_ref::<u32>().copied())
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store
            .set("a", value(7), Duration::from_secs(10))
            .expect("set should succeed");
        assert_eq!(read_u32(&store, "a"), Some(7));
        assert_eq!(read_u32(&store, "b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_absolute_deadline() {
        let store = MemoryStore::new();
        store
            .set("a", value(1), Duration::from_secs(10))
            .expect("set should succeed");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(read_u32(&store, "a"), Some(1));

        // Reads do not extend the deadline.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(read_u32(&store, "a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_value_and_deadline() {
        let store = MemoryStore::new();
        store
            .set("a", value(1), Duration::from_secs(5))
            .expect("set should succeed");
        tokio::time::advance(Duration::from_secs(4)).await;
        store
            .set("a", value(2), Duration::from_secs(5))
            .expect("set should succeed");
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(read_u32(&store, "a"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove() {
        let store = MemoryStore::new();
        store
            .set("a", value(1), Duration::from_secs(5))
            .expect("set should succeed");
        store.remove("a").expect("remove should succeed");
        store.remove("missing").expect("remove of a missing key is ok");
        assert_eq!(read_u32(&store, "a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_sees_only_live_values() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        let add_one = |current: Option<StoredValue>| -> StoredValue {
            let n = current
                .and_then(|v| v.downcast_ref::<u32>().copied())
                .unwrap_or(0);
            Arc::new(n + 1)
        };

        store.update("a", ttl, Box::new(add_one)).expect("update");
        store.update("a", ttl, Box::new(add_one)).expect("update");
        assert_eq!(read_u32(&store, "a"), Some(2));

        tokio::time::advance(ttl).await;
        store.update("a", ttl, Box::new(add_one)).expect("update");
        assert_eq!(read_u32(&store, "a"), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update(
                            "counter",
                            Duration::from_secs(60),
                            Box::new(|current: Option<StoredValue>| -> StoredValue {
                                let n = current
                                    .and_then(|v| v.downcast_ref::<u32>().copied())
                                    .unwrap_or(0);
                                Arc::new(n + 1)
                            }),
                        )
                        .expect("update");
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task should not panic");
        }
        assert_eq!(read_u32(&store, "counter"), Some(64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .set("short", value(1), Duration::from_secs(1))
            .expect("set should succeed");
        store
            .set("long", value(2), Duration::from_secs(100))
            .expect("set should succeed");
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.len().expect("len"), 2);
        assert_eq!(store.purge_expired().expect("purge"), 1);
        assert_eq!(store.len().expect("len"), 1);
        assert_eq!(read_u32(&store, "long"), Some(2));
    }
}

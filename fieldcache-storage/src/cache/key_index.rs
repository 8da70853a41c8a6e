//! Per-entity-type registry of cache keys.
//!
//! The index is itself a store value, kept under the reserved key
//! `"<tag>_CacheKeysCacheKey"` with the same TTL policy as data entries. An
//! expired index reads as empty, and so does a value of unexpected type under
//! the reserved key: both degrade subset matching to a miss, never an error.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use fieldcache_core::{CacheKey, CacheResult, EntityTypeTag};

use crate::store::{ExpiringStore, StoredValue};

/// Every cache key created for one entity type, in rendered-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIndexEntry {
    keys: BTreeSet<CacheKey>,
}

impl KeyIndexEntry {
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheKey> {
        self.keys.iter()
    }

    fn with(&self, key: &CacheKey) -> Self {
        let mut keys = self.keys.clone();
        keys.insert(key.clone());
        Self { keys }
    }
}

impl FromIterator<CacheKey> for KeyIndexEntry {
    fn from_iter<I: IntoIterator<Item = CacheKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Registry of the cache keys created under one entity tag.
///
/// `register` runs its read-modify-write through [`ExpiringStore::update`],
/// so concurrent registrations are never lost, even between separate
/// `KeyIndex` values for the same tag sharing one store.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    tag: EntityTypeTag,
    store_key: String,
}

impl KeyIndex {
    pub fn new(tag: EntityTypeTag) -> Self {
        let store_key = CacheKey::index_key(&tag);
        Self { tag, store_key }
    }

    /// Reserved store key of this index.
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Current registered keys, or an empty entry if none.
    pub fn lookup(&self, store: &dyn ExpiringStore) -> CacheResult<Arc<KeyIndexEntry>> {
        Ok(self.entry_of(store.try_get(&self.store_key)?))
    }

    fn entry_of(&self, value: Option<StoredValue>) -> Arc<KeyIndexEntry> {
        let Some(value) = value else {
            return Arc::new(KeyIndexEntry::default());
        };
        match value.downcast::<KeyIndexEntry>() {
            Ok(entry) => entry,
            Err(_) => {
                tracing::warn!(
                    index_key = %self.store_key,
                    "Key index holds a value of unexpected type, treating as empty"
                );
                Arc::new(KeyIndexEntry::default())
            }
        }
    }

    /// Add `key` to the index, creating the entry if absent.
    ///
    /// Registering a key already present leaves the contents unchanged but
    /// still rewrites the entry, restarting its TTL so the index never
    /// expires before a data entry it lists.
    pub fn register(
        &self,
        store: &dyn ExpiringStore,
        key: &CacheKey,
        ttl: Duration,
    ) -> CacheResult<()> {
        debug_assert_eq!(key.tag(), &self.tag, "key registered under a foreign tag");

        store.update(
            &self.store_key,
            ttl,
            Box::new(|current: Option<StoredValue>| -> StoredValue {
                let current = self.entry_of(current);
                let updated = if current.contains(key) {
                    current
                } else {
                    tracing::debug!(key = %key, "Registering cache key");
                    Arc::new(current.with(key))
                };
                let value: StoredValue = updated;
                value
            }),
        )
    }
}

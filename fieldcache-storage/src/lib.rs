//! FieldCache Storage - Expiring Store and Read-Through Cache
//!
//! Defines the expiring key-value store abstraction and the attribute-subset
//! cache built on top of it. Pure types (keys, attribute sets, config and
//! errors) live in `fieldcache-core`.

pub mod cache;
pub mod store;

pub use cache::{
    find_superset, supersets, CacheRead, CacheStats, CachedList, FieldCache, KeyIndex,
    KeyIndexEntry, OriginSource, ReadSource, SingleFlight,
};
pub use store::{ExpiringStore, MemoryStore, StoreUpdate, StoredValue};

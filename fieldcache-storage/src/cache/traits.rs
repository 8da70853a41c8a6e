//! Origin binding trait and cache statistics.
//!
//! This module defines the capability interface a host implements to let the
//! cache reach its origin data source, and the counters the cache keeps.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fieldcache_core::{AttributeSet, CacheResult, CacheableEntity};

/// Origin bindings for one entity type.
///
/// The cache depends only on this trait, never on a concrete data-access
/// type. Loader errors are returned to the cache's caller exactly as the
/// loader produced them; wrap host failures with
/// [`CacheError::origin`](fieldcache_core::CacheError::origin).
///
/// # Implementation Requirements
///
/// - `fetch_list` and `fetch_by_id` may perform arbitrary I/O and may fail
/// - `fetch_by_id` returns `Ok(None)` when the id does not exist
/// - `extract_by_id` is pure and must not fail
#[async_trait]
pub trait OriginSource<E: CacheableEntity>: Send + Sync {
    /// Load the full list for a query needing `attributes`.
    async fn fetch_list(&self, attributes: &AttributeSet) -> CacheResult<Vec<E>>;

    /// Load a single entity by id.
    async fn fetch_by_id(&self, id: &E::Id, attributes: &AttributeSet) -> CacheResult<Option<E>>;

    /// Find the entity with `id` in a cached list.
    ///
    /// Defaults to matching on [`CacheableEntity::entity_id`].
    fn extract_by_id(&self, list: &[E], id: &E::Id) -> Option<E> {
        list.iter().find(|entity| entity.entity_id() == *id).cloned()
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the exact key.
    pub hits: u64,
    /// Reads served from a cached superset.
    pub superset_hits: u64,
    /// Reads that had to go to the origin (or join a load in flight).
    pub misses: u64,
    /// Origin list loads actually issued.
    pub origin_list_loads: u64,
    /// Origin point loads actually issued.
    pub origin_item_loads: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0), counting superset hits as hits.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.superset_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    superset_hits: AtomicU64,
    misses: AtomicU64,
    origin_list_loads: AtomicU64,
    origin_item_loads: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_superset_hit(&self) {
        self.superset_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_origin_list_load(&self) {
        self.origin_list_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_origin_item_load(&self) {
        self.origin_item_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            superset_hits: self.superset_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            origin_list_loads: self.origin_list_loads.load(Ordering::Relaxed),
            origin_item_loads: self.origin_item_loads.load(Ordering::Relaxed),
        }
    }
}

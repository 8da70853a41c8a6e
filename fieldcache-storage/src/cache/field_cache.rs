//! Attribute-subset read-through cache.
//!
//! [`FieldCache`] answers list and by-id queries for one entity type, keyed by
//! the set of attributes the caller needs. A request is served, in order, from
//! the exact key, from the tightest cached superset of the requested
//! attributes, or from the origin. Origin loads are single-flight per key and
//! their results are written back through the key index and the store.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use fieldcache_core::{
    AttributeSet, CacheConfig, CacheKey, CacheResult, CacheableEntity, ConfigError,
    EntityTypeTag, StoreError,
};

use super::flight::SingleFlight;
use super::key_index::{KeyIndex, KeyIndexEntry};
use super::list::CachedList;
use super::matcher;
use super::read::CacheRead;
use super::traits::{CacheStats, OriginSource, StatsCounters};
use crate::store::{ExpiringStore, MemoryStore, StoredValue};

type ListRead<E> = CacheRead<Arc<CachedList<E>>>;

/// Read-through cache for entities of type `E`.
///
/// Cloning is cheap and every clone shares the same state. Several caches
/// (for different entity types) may share one [`ExpiringStore`].
///
/// # Example
///
/// ```ignore
/// let cache = FieldCache::<Order>::new(CacheConfig::default())?;
/// cache.register_origin(Arc::new(OrderRepository::new(pool)))?;
///
/// // Loads from the origin and caches under {id, customer, total}.
/// let wide = cache.get(&AttributeSet::from(["id", "customer", "total"])).await?;
///
/// // Served from the list above without another origin call.
/// let narrow = cache.get(&AttributeSet::from(["id", "total"])).await?;
/// assert!(narrow.was_superset_hit());
/// ```
pub struct FieldCache<E: CacheableEntity> {
    inner: Arc<Inner<E>>,
}

struct Inner<E: CacheableEntity> {
    tag: EntityTypeTag,
    store: Arc<dyn ExpiringStore>,
    index: KeyIndex,
    origin: RwLock<Option<Arc<dyn OriginSource<E>>>>,
    policy: RwLock<TtlPolicy>,
    list_flights: SingleFlight<CacheKey, ListRead<E>>,
    item_flights: SingleFlight<(CacheKey, E::Id), Option<CacheRead<E>>>,
    stats: StatsCounters,
}

/// Current configuration plus the longest entry TTL ever applied.
///
/// The key index is written with the longest TTL so that shortening the
/// entry TTL never lets the index expire before lists written earlier.
struct TtlPolicy {
    config: CacheConfig,
    index_ttl: Duration,
}

impl TtlPolicy {
    fn new(config: CacheConfig) -> Self {
        Self {
            index_ttl: config.entry_ttl,
            config,
        }
    }

    fn apply(&mut self, config: CacheConfig) {
        self.index_ttl = self.index_ttl.max(config.entry_ttl);
        self.config = config;
    }
}

impl<E: CacheableEntity> FieldCache<E> {
    /// Create a cache over a private in-memory store.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    /// Create a cache over `store`.
    ///
    /// Fails if `config` is invalid or `E::entity_type()` is not a valid tag.
    pub fn with_store(store: Arc<dyn ExpiringStore>, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let tag = EntityTypeTag::new(E::entity_type())?;
        Ok(Self {
            inner: Arc::new(Inner {
                index: KeyIndex::new(tag.clone()),
                tag,
                store,
                origin: RwLock::new(None),
                policy: RwLock::new(TtlPolicy::new(config)),
                list_flights: SingleFlight::new(),
                item_flights: SingleFlight::new(),
                stats: StatsCounters::default(),
            }),
        })
    }

    /// Bind the origin used on misses, replacing any previous binding.
    pub fn register_origin(&self, origin: Arc<dyn OriginSource<E>>) -> CacheResult<()> {
        let mut slot = self.inner.origin.write().map_err(|_| StoreError::LockPoisoned)?;
        *slot = Some(origin);
        tracing::debug!(tag = %self.inner.tag, "Registered origin");
        Ok(())
    }

    /// Replace the TTL policy. Only writes made afterwards use it.
    pub fn set_cache_options(&self, config: CacheConfig) -> CacheResult<()> {
        config.validate()?;
        let mut policy = self.inner.policy.write().map_err(|_| StoreError::LockPoisoned)?;
        tracing::debug!(tag = %self.inner.tag, ttl = ?config.entry_ttl, "Updated cache options");
        policy.apply(config);
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> CacheResult<CacheConfig> {
        let policy = self.inner.policy.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(policy.config.clone())
    }

    pub fn tag(&self) -> &EntityTypeTag {
        &self.inner.tag
    }

    pub fn store(&self) -> &Arc<dyn ExpiringStore> {
        &self.inner.store
    }

    /// Every key currently registered for this entity type.
    pub fn index_keys(&self) -> CacheResult<Arc<KeyIndexEntry>> {
        self.inner.index.lookup(self.inner.store.as_ref())
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    /// Get the list for a query needing `attributes`.
    ///
    /// Only complete lists answer a list query; a partial list under the
    /// exact key is replaced by the origin result.
    pub async fn get(&self, attributes: &AttributeSet) -> CacheResult<ListRead<E>> {
        let origin = self.inner.origin()?;
        let key = CacheKey::build(&self.inner.tag, attributes);

        if let Some(list) = self.inner.cached_list(&key)?.filter(|l| l.is_complete()) {
            tracing::debug!(key = %key, "Cache hit");
            self.inner.stats.record_hit();
            return Ok(CacheRead::exact(list));
        }

        let entry = self.inner.index.lookup(self.inner.store.as_ref())?;
        for candidate in matcher::supersets(&entry, &key) {
            if let Some(list) = self.inner.cached_list(&candidate)?.filter(|l| l.is_complete()) {
                tracing::debug!(key = %key, superset = %candidate, "Superset hit");
                self.inner.stats.record_superset_hit();
                return Ok(CacheRead::superset(list, candidate));
            }
        }

        tracing::debug!(key = %key, "Cache miss");
        self.inner.stats.record_miss();
        let inner = Arc::clone(&self.inner);
        let flight_key = key.clone();
        self.inner
            .list_flights
            .run(key, move || async move { inner.load_list(origin, flight_key).await })
            .await
    }

    /// Get one entity by id for a query needing `attributes`.
    ///
    /// Any cached list, partial or complete, under the exact key or a
    /// superset key is searched first. Otherwise the origin is asked for the
    /// single entity, which is then upserted into the exact key's list.
    /// Returns `Ok(None)` when the origin does not know the id; that outcome
    /// is not cached.
    pub async fn get_by_id(
        &self,
        id: &E::Id,
        attributes: &AttributeSet,
    ) -> CacheResult<Option<CacheRead<E>>> {
        let origin = self.inner.origin()?;
        let key = CacheKey::build(&self.inner.tag, attributes);

        if let Some(list) = self.inner.cached_list(&key)? {
            if let Some(entity) = origin.extract_by_id(&list, id) {
                tracing::debug!(key = %key, ?id, "Cache hit");
                self.inner.stats.record_hit();
                return Ok(Some(CacheRead::exact(entity)));
            }
        }

        let entry = self.inner.index.lookup(self.inner.store.as_ref())?;
        for candidate in matcher::supersets(&entry, &key) {
            let Some(list) = self.inner.cached_list(&candidate)? else {
                continue;
            };
            if let Some(entity) = origin.extract_by_id(&list, id) {
                tracing::debug!(key = %key, superset = %candidate, ?id, "Superset hit");
                self.inner.stats.record_superset_hit();
                return Ok(Some(CacheRead::superset(entity, candidate)));
            }
        }

        tracing::debug!(key = %key, ?id, "Cache miss");
        self.inner.stats.record_miss();
        let inner = Arc::clone(&self.inner);
        let (flight_key, flight_id) = (key.clone(), id.clone());
        self.inner
            .item_flights
            .run((key, id.clone()), move || async move {
                inner.load_item(origin, flight_key, flight_id).await
            })
            .await
    }

    /// Write `entity` through to the list cached for `attributes`.
    ///
    /// Appends to the existing list, or starts a partial list if there is
    /// none, and registers the key.
    pub fn add(&self, entity: E, attributes: &AttributeSet) -> CacheResult<()> {
        let key = CacheKey::build(&self.inner.tag, attributes);
        tracing::debug!(key = %key, "Adding entity");
        self.inner.write_list(&key, |current| match current {
            Some(list) => list.appended(entity),
            None => CachedList::partial(vec![entity]),
        })
    }
}

impl<E: CacheableEntity> Clone for FieldCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: CacheableEntity> Inner<E> {
    fn origin(&self) -> CacheResult<Arc<dyn OriginSource<E>>> {
        let origin = self.origin.read().map_err(|_| StoreError::LockPoisoned)?;
        origin.as_ref().map(Arc::clone).ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "origin".to_string(),
            }
            .into()
        })
    }

    /// TTLs for a list write and for the accompanying index write.
    fn ttls(&self) -> CacheResult<(Duration, Duration)> {
        let policy = self.policy.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok((policy.config.entry_ttl, policy.index_ttl))
    }

    /// The list stored under `key`, if live and of the expected type.
    fn cached_list(&self, key: &CacheKey) -> CacheResult<Option<Arc<CachedList<E>>>> {
        Ok(self.list_of(key, self.store.try_get(key.as_str())?))
    }

    fn list_of(&self, key: &CacheKey, value: Option<StoredValue>) -> Option<Arc<CachedList<E>>> {
        match value?.downcast::<CachedList<E>>() {
            Ok(list) => Some(list),
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    "Cache entry holds a value of unexpected type, treating as a miss"
                );
                None
            }
        }
    }

    /// Replace the list under `key` with `update(current)`.
    ///
    /// The key is registered before the list is written, and the list itself
    /// is rewritten atomically at the store, so the index always lists every
    /// stored key and concurrent writers sharing the store never lose an
    /// update.
    fn write_list<F>(&self, key: &CacheKey, update: F) -> CacheResult<()>
    where
        F: FnOnce(Option<Arc<CachedList<E>>>) -> CachedList<E>,
    {
        let (ttl, index_ttl) = self.ttls()?;
        self.index.register(self.store.as_ref(), key, index_ttl)?;
        self.store.update(
            key.as_str(),
            ttl,
            Box::new(|current: Option<StoredValue>| -> StoredValue {
                let value: StoredValue = Arc::new(update(self.list_of(key, current)));
                value
            }),
        )
    }

    async fn load_list(
        &self,
        origin: Arc<dyn OriginSource<E>>,
        key: CacheKey,
    ) -> CacheResult<ListRead<E>> {
        // A flight that finished just before this one started may have
        // published the list already.
        if let Some(list) = self.cached_list(&key)?.filter(|l| l.is_complete()) {
            return Ok(CacheRead::exact(list));
        }

        self.stats.record_origin_list_load();
        let entities = origin
            .fetch_list(key.attributes())
            .await
            .inspect_err(|e| {
                tracing::debug!(key = %key, error = %e, "Origin list load failed")
            })?;
        tracing::debug!(key = %key, count = entities.len(), "Loaded list from origin");

        let list = Arc::new(CachedList::complete(entities));
        let (ttl, index_ttl) = self.ttls()?;
        self.index.register(self.store.as_ref(), &key, index_ttl)?;
        let value: StoredValue = list.clone();
        self.store.set(key.as_str(), value, ttl)?;
        Ok(CacheRead::origin(list))
    }

    async fn load_item(
        &self,
        origin: Arc<dyn OriginSource<E>>,
        key: CacheKey,
        id: E::Id,
    ) -> CacheResult<Option<CacheRead<E>>> {
        if let Some(entity) = self
            .cached_list(&key)?
            .and_then(|list| origin.extract_by_id(&list, &id))
        {
            return Ok(Some(CacheRead::exact(entity)));
        }

        self.stats.record_origin_item_load();
        let fetched = origin
            .fetch_by_id(&id, key.attributes())
            .await
            .inspect_err(|e| {
                tracing::debug!(key = %key, ?id, error = %e, "Origin point load failed")
            })?;
        let Some(entity) = fetched else {
            tracing::debug!(key = %key, ?id, "Entity not found at origin");
            return Ok(None);
        };

        let stored = entity.clone();
        self.write_list(&key, |current| match current {
            Some(list) => list.upserted(stored),
            None => CachedList::partial(vec![stored]),
        })?;
        Ok(Some(CacheRead::origin(entity)))
    }
}

//! FieldCache Test Utilities
//!
//! Shared test infrastructure for the fieldcache workspace:
//! - The `TestEntity` fixture and its three-row data set
//! - A counting origin with switchable failure and latency
//! - Proptest generators for attribute sets
//! - Custom assertions for cache reads and errors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Once, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

// Re-export core types for convenience
pub use fieldcache_core::{
    AttributeSet, CacheConfig, CacheError, CacheKey, CacheResult, CacheableEntity, ConfigError,
    EntityTypeTag, OriginError,
};
pub use fieldcache_storage::{
    CacheRead, CachedList, ExpiringStore, FieldCache, MemoryStore, OriginSource, ReadSource,
};

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("fieldcache_storage=debug,warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TEST ENTITY
// ============================================================================

/// Row type used across the cache tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntity {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub creation_user: String,
}

impl CacheableEntity for TestEntity {
    type Id = i64;

    fn entity_type() -> &'static str {
        "TestEntity"
    }

    fn entity_id(&self) -> i64 {
        self.id
    }
}

// ============================================================================
// MOCK ORIGIN
// ============================================================================

/// Error returned by [`CountingOrigin`] while failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("origin unavailable: {0}")]
pub struct OriginUnavailable(pub String);

/// In-memory origin counting every call it receives.
///
/// Rows can be replaced between calls to simulate writes at the source, and
/// the origin can be switched into a failing mode or given a fixed latency.
#[derive(Debug)]
pub struct CountingOrigin {
    rows: RwLock<Vec<TestEntity>>,
    failure: RwLock<Option<String>>,
    latency: Duration,
    list_calls: AtomicUsize,
    item_calls: AtomicUsize,
}

impl CountingOrigin {
    pub fn new(rows: Vec<TestEntity>) -> Self {
        Self {
            rows: RwLock::new(rows),
            failure: RwLock::new(None),
            latency: Duration::ZERO,
            list_calls: AtomicUsize::new(0),
            item_calls: AtomicUsize::new(0),
        }
    }

    /// Origin serving [`fixtures::test_entities`].
    pub fn with_fixtures() -> Self {
        Self::new(fixtures::test_entities())
    }

    /// Sleep for `latency` inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every subsequent call with `reason`, or recover with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = reason.map(str::to_string);
        }
    }

    /// Insert or replace a row at the source.
    pub fn upsert_row(&self, entity: TestEntity) {
        if let Ok(mut rows) = self.rows.write() {
            rows.retain(|row| row.id != entity.id);
            rows.push(entity);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, answer: impl FnOnce(&[TestEntity]) -> T) -> CacheResult<T> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.failure.read().ok().and_then(|f| f.clone());
        if let Some(reason) = failure {
            return Err(CacheError::origin(OriginUnavailable(reason)));
        }
        let rows = self
            .rows
            .read()
            .map_err(|_| CacheError::Origin(OriginError::msg("origin rows poisoned")))?;
        Ok(answer(&rows))
    }
}

#[async_trait]
impl OriginSource<TestEntity> for CountingOrigin {
    async fn fetch_list(&self, _attributes: &AttributeSet) -> CacheResult<Vec<TestEntity>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(|rows| rows.to_vec()).await
    }

    async fn fetch_by_id(
        &self,
        id: &i64,
        _attributes: &AttributeSet,
    ) -> CacheResult<Option<TestEntity>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(|rows| rows.iter().find(|row| row.id == *id).cloned())
            .await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for property-based testing.

    use super::*;
    use proptest::prelude::*;

    /// Attribute names of [`TestEntity`](super::TestEntity) plus a few extras.
    pub const ATTRIBUTE_NAMES: [&str; 7] = [
        "id",
        "name",
        "description",
        "creationDate",
        "creationUser",
        "tags",
        "owner_id",
    ];

    /// Generate a subset of [`ATTRIBUTE_NAMES`].
    pub fn arb_attribute_set() -> impl Strategy<Value = AttributeSet> {
        prop::sample::subsequence(ATTRIBUTE_NAMES.to_vec(), 0..=ATTRIBUTE_NAMES.len())
            .prop_map(|names| names.into_iter().collect())
    }

    /// Generate an attribute set with arbitrary names, separators included.
    pub fn arb_free_attribute_set() -> impl Strategy<Value = AttributeSet> {
        prop::collection::btree_set("[a-zA-Z_,\\\\:]{1,8}", 0..6).prop_map(AttributeSet::from)
    }

    /// Generate a test entity.
    pub fn arb_test_entity() -> impl Strategy<Value = TestEntity> {
        (1i64..1000, "[a-zA-Z ]{1,20}", "[a-zA-Z ]{0,40}").prop_map(|(id, name, description)| {
            TestEntity {
                id,
                name,
                description,
                creation_date: fixtures::creation_date(),
                creation_user: "SYSTEM".to_string(),
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Creation date shared by every fixture row.
    pub fn creation_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 3, 6, 16, 58, 59)
            .single()
            .unwrap_or_default()
    }

    /// Build fixture row `n`.
    pub fn test_entity(n: i64) -> TestEntity {
        TestEntity {
            id: n,
            name: format!("Test {n}"),
            description: format!("Test entity {n}"),
            creation_date: creation_date(),
            creation_user: "SYSTEM".to_string(),
        }
    }

    /// The three-row data set.
    pub fn test_entities() -> Vec<TestEntity> {
        (1..=3).map(test_entity).collect()
    }

    /// Every attribute of [`TestEntity`].
    pub fn all_attributes() -> AttributeSet {
        AttributeSet::from(["id", "name", "description", "creationDate", "creationUser"])
    }

    /// A cache over a private store with an origin serving the fixtures.
    pub fn fixture_cache() -> (FieldCache<TestEntity>, std::sync::Arc<CountingOrigin>) {
        fixture_cache_with(CountingOrigin::with_fixtures())
    }

    /// A cache over a private store bound to `origin`.
    pub fn fixture_cache_with(
        origin: CountingOrigin,
    ) -> (FieldCache<TestEntity>, std::sync::Arc<CountingOrigin>) {
        let origin = std::sync::Arc::new(origin);
        let cache = FieldCache::new(CacheConfig::default()).expect("default config is valid");
        cache
            .register_origin(origin.clone())
            .expect("origin registration");
        (cache, origin)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for cache reads and errors.

    use super::*;

    /// Assert that a read came from the exact key.
    #[track_caller]
    pub fn assert_exact_hit<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert_eq!(read.source(), &ReadSource::Exact, "Expected exact hit, got: {:?}", read);
    }

    /// Assert that a read reused the list cached for `attributes`.
    #[track_caller]
    pub fn assert_superset_hit<T: std::fmt::Debug>(read: &CacheRead<T>, attributes: &AttributeSet) {
        match read.source() {
            ReadSource::Superset { key } => assert_eq!(
                key.attributes(),
                attributes,
                "Superset hit served from the wrong key"
            ),
            other => panic!("Expected superset hit, got: {:?}", other),
        }
    }

    /// Assert that a read went to the origin.
    #[track_caller]
    pub fn assert_origin_load<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert_eq!(read.source(), &ReadSource::Origin, "Expected origin load, got: {:?}", read);
    }

    /// Assert that a result is an origin failure carrying `reason`.
    #[track_caller]
    pub fn assert_origin_unavailable<T: std::fmt::Debug>(result: &CacheResult<T>, reason: &str) {
        match result {
            Err(CacheError::Origin(err)) => {
                let inner = err
                    .downcast_ref::<OriginUnavailable>()
                    .expect("origin error should wrap OriginUnavailable");
                assert_eq!(inner.0, reason);
            }
            other => panic!("Expected origin failure, got: {:?}", other),
        }
    }

    /// Assert that every key holding a list is present in the key index.
    #[track_caller]
    pub fn assert_index_covers(cache: &FieldCache<TestEntity>, keys: &[CacheKey]) {
        let index = cache.index_keys().expect("index lookup");
        for key in keys {
            assert!(index.contains(key), "Key {} missing from index", key);
        }
    }
}

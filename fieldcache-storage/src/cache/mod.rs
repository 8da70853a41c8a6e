//! Attribute-subset result cache.
//!
//! Lists of entities are cached under a key derived from the set of
//! attributes the query needed. A later query needing a subset of a cached
//! set is served from that list: the consumer simply ignores the extra
//! attributes, so no projection is materialized.
//!
//! # Resolution Order
//!
//! 1. The exact key for the requested attribute set.
//! 2. The tightest cached superset, found through the per-type [`KeyIndex`].
//! 3. The origin, through a single-flight load that publishes its result.
//!
//! Every read returns a [`CacheRead<T>`] recording which step served it.
//!
//! # Example
//!
//! ```ignore
//! let cache = FieldCache::<Customer>::new(CacheConfig::default())?;
//! cache.register_origin(Arc::new(CustomerRepository::new(pool)))?;
//!
//! let all = cache.get(&AttributeSet::from(["id", "name", "email"])).await?;
//! let one = cache.get_by_id(&42, &AttributeSet::from(["id", "email"])).await?;
//! ```

pub mod field_cache;
pub mod flight;
pub mod key_index;
pub mod list;
pub mod matcher;
pub mod read;
pub mod traits;

pub use field_cache::FieldCache;
pub use flight::SingleFlight;
pub use key_index::{KeyIndex, KeyIndexEntry};
pub use list::CachedList;
pub use matcher::{find_superset, supersets};
pub use read::{CacheRead, ReadSource};
pub use traits::{CacheStats, OriginSource};

//! Fieldcache Core - Cache Key Types
//!
//! Pure data types shared by the cache crates: requested attribute sets,
//! entity tags, canonical cache keys, configuration and the error taxonomy.
//! This crate performs no I/O.

pub mod attributes;
pub mod config;
pub mod entity;
pub mod error;
pub mod key;

pub use attributes::AttributeSet;
pub use config::{CacheConfig, DEFAULT_ENTRY_TTL, ENTRY_TTL_ENV};
pub use entity::{CacheableEntity, EntityTypeTag, KEY_SEPARATOR};
pub use error::{
    CacheError, CacheResult, ConfigError, OriginError, StoreError, ValidationError,
};
pub use key::{CacheKey, INDEX_KEY_SUFFIX};

//! Read results carrying where the data came from.
//!
//! Callers get a [`CacheRead<T>`] rather than a bare value so they (and the
//! tests) can tell an exact hit from a superset hit from an origin load.

use fieldcache_core::CacheKey;

/// Where a read was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadSource {
    /// The requested key itself was cached.
    Exact,
    /// A cached list for a wider attribute set was reused.
    Superset {
        /// Key of the list that served the read.
        key: CacheKey,
    },
    /// The origin was called (by this caller or by a concurrent one it joined).
    Origin,
}

/// Result of a cache read, carrying its source.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    /// Create a read served from the exact key.
    pub fn exact(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Exact,
        }
    }

    /// Create a read served from the list cached under `key`.
    pub fn superset(value: T, key: CacheKey) -> Self {
        Self {
            value,
            source: ReadSource::Superset { key },
        }
    }

    /// Create a read that went to the origin.
    pub fn origin(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Origin,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> &ReadSource {
        &self.source
    }

    /// Returns true if no origin call was needed.
    pub fn was_cache_hit(&self) -> bool {
        !matches!(self.source, ReadSource::Origin)
    }

    /// Returns true if the read reused a superset list.
    pub fn was_superset_hit(&self) -> bool {
        matches!(self.source, ReadSource::Superset { .. })
    }

    /// Map the value, keeping the source.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            source: self.source,
        }
    }
}

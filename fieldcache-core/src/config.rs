//! Configuration types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default absolute lifetime of a cache entry: one day from write time.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Environment variable overriding [`CacheConfig::entry_ttl`], in seconds.
pub const ENTRY_TTL_ENV: &str = "FIELDCACHE_ENTRY_TTL_SECS";

/// Per-instance cache configuration.
///
/// A new configuration only affects writes made after it is applied; entries
/// already in the store keep the expiry they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Absolute TTL applied to every list and key-index write.
    #[serde(with = "duration_secs")]
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: DEFAULT_ENTRY_TTL,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Create a config from environment variables.
    ///
    /// Environment variables:
    /// - `FIELDCACHE_ENTRY_TTL_SECS`: entry lifetime in seconds (default: 86400)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(ENTRY_TTL_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: ENTRY_TTL_ENV.to_string(),
                value: raw.clone(),
                reason: "expected a whole number of seconds".to_string(),
            })?;
            config.entry_ttl = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make every write expire immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "entry_ttl".to_string(),
                value: format!("{:?}", self.entry_ttl),
                reason: "TTL must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

//! Error types for fieldcache operations

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Validation errors raised while constructing cache identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Entity type tag must not be empty")]
    EmptyEntityTag,

    #[error("Entity type tag {tag:?} contains reserved character {reserved:?}")]
    ReservedCharacter { tag: String, reserved: char },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Expiring store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Failure raised by a host origin loader.
///
/// The underlying error is kept behind an `Arc` so one failed origin call can
/// be handed to every caller waiting on it. Use [`OriginError::downcast_ref`]
/// to recover the host's concrete error type.
#[derive(Clone)]
pub struct OriginError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl OriginError {
    /// Wrap a host error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build an origin error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Borrow the host error as its concrete type, if it is one.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Borrow the host error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl fmt::Debug for OriginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OriginError").field(&self.inner).finish()
    }
}

impl fmt::Display for OriginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for OriginError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

/// Master error type for all fieldcache errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Origin error: {0}")]
    Origin(#[from] OriginError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Shorthand for an origin loader failure.
    pub fn origin<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Origin(OriginError::new(error))
    }

    /// Returns true if this error came from an origin loader.
    pub fn is_origin(&self) -> bool {
        matches!(self, Self::Origin(_))
    }
}

/// Result type alias for fieldcache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct DatabaseDown {
        host: &'static str,
    }

    impl fmt::Display for DatabaseDown {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "database at {} is down", self.host)
        }
    }

    impl StdError for DatabaseDown {}

    #[test]
    fn test_origin_error_keeps_host_error() {
        let err = CacheError::origin(DatabaseDown { host: "db-1" });
        let CacheError::Origin(origin) = &err else {
            panic!("expected origin error, got {err:?}");
        };
        assert_eq!(
            origin.downcast_ref::<DatabaseDown>(),
            Some(&DatabaseDown { host: "db-1" })
        );
        assert!(err.is_origin());
    }

    #[test]
    fn test_origin_error_display_is_transparent() {
        let err = OriginError::new(DatabaseDown { host: "db-2" });
        assert_eq!(err.to_string(), "database at db-2 is down");

        let wrapped = CacheError::from(err);
        assert_eq!(wrapped.to_string(), "Origin error: database at db-2 is down");
    }

    #[test]
    fn test_origin_error_clones_share_source() {
        let err = OriginError::msg("timeout");
        let cloned = err.clone();
        assert!(std::ptr::addr_eq(err.get_ref(), cloned.get_ref()));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::ReservedCharacter {
            tag: "a:b".to_string(),
            reserved: ':',
        };
        let msg = format!("{}", err);
        assert!(msg.contains("a:b"));
        assert!(msg.contains("':'"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: CacheError = ConfigError::MissingRequired {
            field: "origin".to_string(),
        }
        .into();
        assert!(matches!(err, CacheError::Config(_)));
        assert!(!err.is_origin());
    }
}

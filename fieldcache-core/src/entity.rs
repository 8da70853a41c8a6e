//! Entity identity: type tags and the cacheable entity trait

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Character separating the entity tag from the attribute list in a rendered
/// cache key. Tags may not contain it.
pub const KEY_SEPARATOR: char = ':';

/// Name of an entity kind. Every cache key of one kind lives under its tag.
///
/// Can only be built through [`EntityTypeTag::new`], which rejects empty tags
/// and tags containing [`KEY_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityTypeTag(String);

impl EntityTypeTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, ValidationError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(ValidationError::EmptyEntityTag);
        }
        if tag.contains(KEY_SEPARATOR) {
            return Err(ValidationError::ReservedCharacter {
                tag,
                reserved: KEY_SEPARATOR,
            });
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityTypeTag {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityTypeTag> for String {
    fn from(tag: EntityTypeTag) -> Self {
        tag.0
    }
}

impl fmt::Display for EntityTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for entity types that can be held in a field cache.
///
/// # Implementation Requirements
///
/// - `entity_type()` must return the same tag for every instance
/// - `entity_id()` must identify the instance within its entity type; it is
///   what upserts replace on
pub trait CacheableEntity: Clone + Send + Sync + 'static {
    /// Identifier type of this entity.
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Tag naming this entity kind.
    fn entity_type() -> &'static str;

    /// Identifier of this instance.
    fn entity_id(&self) -> Self::Id;
}

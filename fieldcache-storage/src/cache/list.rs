//! Cached entity lists.

use std::ops::Deref;

use fieldcache_core::CacheableEntity;

/// The value stored under a data [`CacheKey`](fieldcache_core::CacheKey).
///
/// Published lists are shared behind an `Arc` and never mutated; every update
/// builds a new list and replaces the store entry.
///
/// A list is *complete* when it is the full result of an origin list load.
/// Lists assembled from manual adds or point fetches are *partial*: they can
/// answer lookups by id but not a list query.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedList<E> {
    entities: Vec<E>,
    complete: bool,
}

impl<E> CachedList<E> {
    /// List holding the full origin result.
    pub fn complete(entities: Vec<E>) -> Self {
        Self {
            entities,
            complete: true,
        }
    }

    /// List built from individual writes.
    pub fn partial(entities: Vec<E>) -> Self {
        Self {
            entities,
            complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entities
    }

    pub fn into_vec(self) -> Vec<E> {
        self.entities
    }
}

impl<E: Clone> CachedList<E> {
    /// Copy of this list with `entity` appended.
    pub fn appended(&self, entity: E) -> Self {
        let mut entities = Vec::with_capacity(self.entities.len() + 1);
        entities.extend_from_slice(&self.entities);
        entities.push(entity);
        Self {
            entities,
            complete: self.complete,
        }
    }
}

impl<E: CacheableEntity> CachedList<E> {
    /// Copy of this list with any entity sharing `entity`'s id removed and
    /// `entity` appended.
    pub fn upserted(&self, entity: E) -> Self {
        let id = entity.entity_id();
        let mut entities: Vec<E> = self
            .entities
            .iter()
            .filter(|existing| existing.entity_id() != id)
            .cloned()
            .collect();
        entities.push(entity);
        Self {
            entities,
            complete: self.complete,
        }
    }
}

impl<E> Deref for CachedList<E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.entities
    }
}

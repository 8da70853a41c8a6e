//! Superset search over a key index.
//!
//! A cached list fetched for attribute set `A` can answer any request for a
//! subset of `A`: the consumer simply ignores the extra attributes. The
//! matcher picks, among the indexed keys covering a request, the one with the
//! fewest attributes. Ties go to the lexicographically smallest rendered key,
//! so the choice is deterministic for a given index snapshot.

use std::cmp::Ordering;

use fieldcache_core::CacheKey;

use super::key_index::KeyIndexEntry;

/// Every indexed key able to serve `requested`, best candidate first.
///
/// `requested` itself is never returned; an exact hit is resolved by a direct
/// store lookup before matching.
pub fn supersets(entry: &KeyIndexEntry, requested: &CacheKey) -> Vec<CacheKey> {
    let mut candidates: Vec<CacheKey> = entry
        .iter()
        .filter(|candidate| covers(candidate, requested))
        .cloned()
        .collect();
    candidates.sort_by(rank);
    candidates
}

/// The tightest indexed superset of `requested`, if any.
pub fn find_superset(entry: &KeyIndexEntry, requested: &CacheKey) -> Option<CacheKey> {
    entry
        .iter()
        .filter(|candidate| covers(candidate, requested))
        .min_by(|a, b| rank(a, b))
        .cloned()
}

fn covers(candidate: &CacheKey, requested: &CacheKey) -> bool {
    candidate != requested
        && candidate.tag() == requested.tag()
        && candidate.attributes().is_superset_of(requested.attributes())
}

fn rank(a: &CacheKey, b: &CacheKey) -> Ordering {
    a.attributes()
        .len()
        .cmp(&b.attributes().len())
        .then_with(|| a.cmp(b))
}

//! Canonical cache keys derived from an entity tag and an attribute set.
//!
//! A [`CacheKey`] can only be obtained from [`CacheKey::build`], so every key
//! in the system is canonical: the attribute set is sorted and deduplicated
//! before rendering, and attribute names are escaped so that two different
//! sets never render to the same string.

use crate::attributes::AttributeSet;
use crate::entity::{EntityTypeTag, KEY_SEPARATOR};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between attribute names in a rendered key.
const ATTRIBUTE_SEPARATOR: char = ',';

/// Escape prefix for separator and escape characters inside attribute names.
const ESCAPE: char = '\\';

/// Suffix of the reserved key under which a tag's key index is stored.
pub const INDEX_KEY_SUFFIX: &str = "_CacheKeysCacheKey";

/// Identifier of one cached list: an entity tag plus the attribute set the
/// list was fetched for.
///
/// # Rendered Format
///
/// `"<tag>:<attr>,<attr>,..."` with attributes in sorted order, and `\` and
/// `,` inside attribute names escaped with a leading `\`. Tags cannot contain
/// `:`, so a rendered data key never equals a reserved index key (see
/// [`CacheKey::index_key`]).
///
/// Equality, hashing and ordering all follow the rendered form, which is a
/// one-to-one function of `(tag, attributes)`.
#[derive(Debug, Clone)]
pub struct CacheKey {
    tag: EntityTypeTag,
    attributes: AttributeSet,
    rendered: String,
}

impl CacheKey {
    /// Build the canonical key for `attributes` under `tag`.
    pub fn build(tag: &EntityTypeTag, attributes: &AttributeSet) -> Self {
        let mut rendered = String::with_capacity(tag.as_str().len() + 1 + attributes.len() * 8);
        rendered.push_str(tag.as_str());
        rendered.push(KEY_SEPARATOR);
        for (i, name) in attributes.iter().enumerate() {
            if i > 0 {
                rendered.push(ATTRIBUTE_SEPARATOR);
            }
            push_escaped(&mut rendered, name);
        }

        Self {
            tag: tag.clone(),
            attributes: attributes.clone(),
            rendered,
        }
    }

    /// Reserved store key holding the key index for `tag`.
    pub fn index_key(tag: &EntityTypeTag) -> String {
        format!("{}{}", tag.as_str(), INDEX_KEY_SUFFIX)
    }

    pub fn tag(&self) -> &EntityTypeTag {
        &self.tag
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Rendered store key.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

fn push_escaped(out: &mut String, name: &str) {
    for c in name.chars() {
        if c == ATTRIBUTE_SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.rendered == other.rendered
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered.hash(state);
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rendered.cmp(&other.rendered)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn attribute_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z_,\\\\]{0,6}", 0..6)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Shuffling the requested names never changes the key.
        #[test]
        fn prop_key_is_order_independent(names in attribute_names()) {
            let tag = EntityTypeTag::new("Entity").expect("valid tag");
            let mut reversed = names.clone();
            reversed.reverse();

            let a = CacheKey::build(&tag, &names.iter().cloned().collect());
            let b = CacheKey::build(&tag, &reversed.into_iter().collect());
            prop_assert_eq!(a.as_str(), b.as_str());
        }

        /// Different attribute sets always render to different keys.
        #[test]
        fn prop_rendering_is_injective(a in attribute_names(), b in attribute_names()) {
            let tag = EntityTypeTag::new("Entity").expect("valid tag");
            let set_a: AttributeSet = a.into_iter().collect();
            let set_b: AttributeSet = b.into_iter().collect();

            let key_a = CacheKey::build(&tag, &set_a);
            let key_b = CacheKey::build(&tag, &set_b);
            prop_assert_eq!(set_a == set_b, key_a.as_str() == key_b.as_str());
        }
    }
}

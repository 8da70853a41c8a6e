//! Requested attribute sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The set of attribute names a caller requested for one query.
///
/// Names are kept sorted and deduplicated, so two sets built from the same
/// names in different orders compare (and hash) equal. Empty names carry no
/// meaning and are dropped. Sets are partially ordered by inclusion; see
/// [`AttributeSet::is_subset_of`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct AttributeSet {
    names: BTreeSet<String>,
}

impl AttributeSet {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct attributes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns true if every attribute of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &AttributeSet) -> bool {
        self.names.is_subset(&other.names)
    }

    /// Returns true if `self` covers every attribute of `other`.
    pub fn is_superset_of(&self, other: &AttributeSet) -> bool {
        other.is_subset_of(self)
    }

    /// Return a copy with `name` added.
    pub fn with(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.names.insert(name);
        }
        self
    }

    /// Return a copy with `name` removed.
    pub fn without(mut self, name: &str) -> Self {
        self.names.remove(name);
        self
    }

    /// Iterate attribute names in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for AttributeSet {
    fn from(names: [S; N]) -> Self {
        names.into_iter().collect()
    }
}

impl From<BTreeSet<String>> for AttributeSet {
    fn from(names: BTreeSet<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<AttributeSet> for BTreeSet<String> {
    fn from(set: AttributeSet) -> Self {
        set.names
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        f.write_str("}")
    }
}

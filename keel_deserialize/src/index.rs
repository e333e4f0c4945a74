use crate::Slug;
use thiserror::Error;

/// Resolves arbitrarily spelled keys against a fixed set of canonical names,
/// such as the field names of a struct or the variant names of an enum.
#[derive(Debug, Clone, Copy)]
pub struct SlugIndex<'a> {
    names: &'a [&'a str],
}

/// Two keys of the same document map normalize to the same [`Slug`] and
/// cannot be merged.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("keys '{first}' and '{second}' name the same setting")]
pub struct SlugCollision {
    /// Original spelling of the first key
    pub first: String,
    /// Original spelling of the second key
    pub second: String,
}

impl<'a> SlugIndex<'a> {
    /// Creates an index over the given canonical names.
    pub fn new(names: &'a [&'a str]) -> Self {
        Self { names }
    }

    /// Returns the canonical name matching the given key, if any.
    ///
    /// An exact match is preferred over a slug match, so names that differ
    /// only by punctuation can still be addressed precisely.
    pub fn resolve(&self, key: &str) -> Option<&'a str> {
        if let Some(exact) = self.names.iter().find(|name| **name == key) {
            return Some(*exact);
        }

        self.names
            .iter()
            .find(|name| Slug::eq_as_slugs(name, key))
            .copied()
    }

    /// The canonical names this index resolves to.
    pub fn names(&self) -> &'a [&'a str] {
        self.names
    }
}

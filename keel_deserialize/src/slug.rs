use crate::SlugCollision;
use serde_value::Value;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// An owned key that remembers its original spelling and compares by its
/// normalized form: ASCII alphanumeric characters only, lowercased.
///
/// `"PANIC_WATCH"`, `"PanicWatch"` and `"panic-watch"` are all the same slug.
/// The flip side is that keys differing only by punctuation cannot be told
/// apart, so `"re-sign"` and `"resign"` collide.
#[derive(Debug, Clone)]
pub struct Slug {
    original: String,
    normalized: String,
}

impl Slug {
    /// Creates a new [`Slug`], retaining the given input as its original
    /// spelling.
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let normalized = significant(&original)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self {
            original,
            normalized,
        }
    }

    /// The spelling this slug was created from.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The normalized form, which is what comparisons use.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl Slug {
    /// Checks two strings for slug equivalence without allocating.
    pub fn eq_as_slugs(a: &str, b: &str) -> bool {
        Self::cmp_as_slugs(a, b) == Ordering::Equal
    }

    /// Orders two strings as slugs without allocating.
    pub fn cmp_as_slugs(a: &str, b: &str) -> Ordering {
        let a = significant(a).map(|c| c.to_ascii_lowercase());
        let b = significant(b).map(|c| c.to_ascii_lowercase());

        a.cmp(b)
    }
}

impl Slug {
    /// Groups the string-keyed entries of a document map by slug.
    ///
    /// Keys that normalize to the same slug are merged when both values are
    /// maps (the longer original spelling wins on conflicting inner keys).
    /// Any other collision is reported as a [`SlugCollision`]. Entries with
    /// non-string keys are skipped.
    pub fn group(map: BTreeMap<Value, Value>) -> Result<Vec<(Slug, Value)>, SlugCollision> {
        let mut grouped: Vec<(Slug, Value)> = Vec::with_capacity(map.len());

        for (key, value) in map {
            let Value::String(key) = key else {
                continue;
            };
            let slug = Slug::new(key);

            match grouped.iter().position(|(known, _)| *known == slug) {
                None => grouped.push((slug, value)),
                Some(position) => {
                    let (known, existing) = grouped.swap_remove(position);
                    let merged = merge(&known, existing, &slug, value)?;
                    let winner = if known.original.len() >= slug.original.len() {
                        known
                    } else {
                        slug
                    };
                    grouped.push((winner, merged));
                }
            }
        }

        Ok(grouped)
    }
}

fn significant(input: &str) -> impl Iterator<Item = char> + '_ {
    input.chars().filter(char::is_ascii_alphanumeric)
}

fn merge(known: &Slug, existing: Value, next: &Slug, value: Value) -> Result<Value, SlugCollision> {
    match (existing, value) {
        (Value::Map(mut existing), Value::Map(mut value)) => {
            if known.original.len() >= next.original.len() {
                value.extend(existing);
                Ok(Value::Map(value))
            } else {
                existing.extend(value);
                Ok(Value::Map(existing))
            }
        }
        _ => Err(SlugCollision {
            first: known.original.clone(),
            second: next.original.clone(),
        }),
    }
}

const _: () = {
    impl PartialEq for Slug {
        fn eq(&self, other: &Self) -> bool {
            self.normalized == other.normalized
        }
    }

    impl Eq for Slug {}

    impl PartialOrd for Slug {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for Slug {
        fn cmp(&self, other: &Self) -> Ordering {
            self.normalized.cmp(&other.normalized)
        }
    }

    impl Hash for Slug {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.normalized.hash(state);
        }
    }

    impl From<&str> for Slug {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    impl From<String> for Slug {
        fn from(value: String) -> Self {
            Self::new(value)
        }
    }

    impl Borrow<str> for Slug {
        fn borrow(&self) -> &str {
            &self.normalized
        }
    }

    impl AsRef<str> for Slug {
        fn as_ref(&self) -> &str {
            &self.normalized
        }
    }

    impl Display for Slug {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.original)
        }
    }
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalization() {
        assert_eq!(Slug::new("panicwatch").normalized(), "panicwatch");
        assert_eq!(Slug::new("PANIC_WATCH").normalized(), "panicwatch");
        assert_eq!(Slug::new("Panic-Watch").normalized(), "panicwatch");
        assert_eq!(Slug::new("  panic watch!! ").normalized(), "panicwatch");
        assert_eq!(Slug::new("v2_api").normalized(), "v2api");
        assert_eq!(Slug::new("aβc").normalized(), "ac");
        assert_eq!(Slug::new("--__--").normalized(), "");
        assert_eq!(Slug::new("").normalized(), "");
    }

    #[test]
    fn original_is_retained() {
        // Given
        let slug = Slug::new("Local_Time");

        // Then
        assert_eq!(slug.original(), "Local_Time");
        assert_eq!(slug.to_string(), "Local_Time");
    }

    #[test]
    fn allocation_free_comparison_agrees_with_slugs() {
        let cases = [
            ("local_time", "LocalTime"),
            ("local_time", "LOCAL-TIME"),
            ("abc", "abd"),
            ("abc", "ab"),
            ("ab", "abc"),
            ("", "!!!"),
            ("a1", "A_1"),
            ("abc", "aβc"),
        ];

        for (a, b) in cases {
            let expected = Slug::new(a).cmp(&Slug::new(b));
            assert_eq!(Slug::cmp_as_slugs(a, b), expected, "{a} vs {b}");
            assert_eq!(
                Slug::eq_as_slugs(a, b),
                expected == Ordering::Equal,
                "{a} vs {b}",
            );
        }
    }

    #[test]
    fn group_merges_nested_maps() {
        // Given
        let mut inner_long = BTreeMap::new();
        inner_long.insert(Value::String("verbosity".into()), Value::String("debug".into()));
        let mut inner_short = BTreeMap::new();
        inner_short.insert(Value::String("verbosity".into()), Value::String("info".into()));
        inner_short.insert(Value::String("json".into()), Value::Bool(true));

        let mut map = BTreeMap::new();
        map.insert(Value::String("Logger_".into()), Value::Map(inner_long));
        map.insert(Value::String("logger".into()), Value::Map(inner_short));

        // When
        let grouped = Slug::group(map).unwrap();

        // Then
        assert_eq!(grouped.len(), 1);
        let (slug, value) = &grouped[0];
        assert_eq!(slug.original(), "Logger_");
        let Value::Map(merged) = value else {
            panic!("expected a map");
        };
        assert_eq!(
            merged.get(&Value::String("verbosity".into())),
            Some(&Value::String("debug".into())),
        );
        assert_eq!(
            merged.get(&Value::String("json".into())),
            Some(&Value::Bool(true)),
        );
    }

    #[test]
    fn group_rejects_scalar_collision() {
        // Given
        let mut map = BTreeMap::new();
        map.insert(Value::String("local_time".into()), Value::Bool(true));
        map.insert(Value::String("LocalTime".into()), Value::Bool(false));

        // When
        let error = Slug::group(map).unwrap_err();

        // Then
        assert_eq!(
            error.to_string(),
            "keys 'LocalTime' and 'local_time' name the same setting",
        );
    }
}

use std::fmt::{Display, Formatter};

/// The contract for settings that check themselves after decoding.
///
/// Implementations should report every problem they find, not just the
/// first one, so that an operator can fix a configuration file in one pass.
///
/// ## Example
///
/// ```
/// use keel_config::{Validate, ValidationErrors};
///
/// struct Pool {
///     min: u16,
///     max: u16,
/// }
///
/// impl Validate for Pool {
///     fn validate(&self) -> Result<(), ValidationErrors> {
///         let mut errors = ValidationErrors::new();
///
///         errors.check(self.max > 0, "max must be positive");
///         errors.check(self.min <= self.max, "min must not exceed max");
///
///         errors.into_result()
///     }
/// }
///
/// let error = Pool { min: 3, max: 0 }.validate().unwrap_err();
/// assert_eq!(
///     error.to_string(),
///     "2 errors: [max must be positive; min must not exceed max]",
/// );
/// ```
pub trait Validate {
    /// Checks this value, returning every problem found.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// An aggregate of validation problems, in the order they were found.
///
/// Renders a single problem as its bare message, and several problems as a
/// counted list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<String>,
}

impl ValidationErrors {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a problem.
    pub fn push(&mut self, error: impl Display) {
        self.errors.push(error.to_string());
    }

    /// Records the given problem unless the condition holds.
    pub fn check(&mut self, condition: bool, error: impl Display) {
        if !condition {
            self.push(error);
        }
    }

    /// The number of recorded problems.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Reports whether no problems are recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the recorded problems.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(String::as_str)
    }

    /// Returns `Ok(())` when nothing is recorded, or this aggregate as the
    /// error otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("no errors"),
            [single] => f.write_str(single),
            many => write!(f, "{} errors: [{}]", many.len(), many.join("; ")),
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl<E: Display> FromIterator<E> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().map(|error| error.to_string()).collect(),
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

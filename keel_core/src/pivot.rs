use std::env;
use std::path::PathBuf;

/// Owns the logic for [resolving](Pivot::resolve) the runtime pivot directory.
///
/// ## Pivot directory
///
/// The pivot directory is the current working directory of the process,
/// **unless** it runs under Cargo (`cargo run`, `cargo test`, an IDE, etc.):
/// then it is the directory containing the crate's `Cargo.toml`.
pub struct Pivot;

impl Pivot {
    /// Resolves the pivot directory, reading `CARGO_MANIFEST_DIR` first and
    /// falling back to the [current](env::current_dir) working directory.
    ///
    /// Returns `None` only when neither is available (e.g., the working
    /// directory was removed).
    pub fn resolve() -> Option<PathBuf> {
        env::var_os("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .or_else(|| env::current_dir().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_manifest_dir_under_cargo() {
        // When
        let pivot = Pivot::resolve();

        // Then
        assert_eq!(pivot, Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))));
    }
}

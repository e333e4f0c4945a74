use serde::Deserialize;

/// Represents a particular preset of configuration for the
/// [event formatter](tracing_subscriber::fmt::format::Format) used by the
/// [formatted layer](tracing_subscriber::fmt::Layer).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatFlavor {
    /// Uses the default [`Full`](tracing_subscriber::fmt::format::Full) event formatting.
    #[default]
    Full,

    /// Uses the [`Compact`](tracing_subscriber::fmt::format::Compact) event formatting.
    Compact,

    /// Uses the multi-line [`Pretty`](tracing_subscriber::fmt::format::Pretty) event formatting.
    Pretty,

    /// Uses the [`Json`](tracing_subscriber::fmt::format::Json) event formatting.
    Json,
}

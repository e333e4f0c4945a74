use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing_core::LevelFilter as TracingLevelFilter;

/// A thin abstraction around the `tracing` crate’s
/// [`LevelFilter`](TracingLevelFilter) that can be parsed, rendered and
/// deserialized.
///
/// A verbosity level is “higher” if it is more verbose. In this sense,
/// [`Trace`](Verbosity::Trace) is higher (more verbose) than
/// [`Error`](Verbosity::Error).
///
/// Conversely, a verbosity level is “lower” if it is less verbose. In this
/// sense, [`Warn`](Verbosity::Warn) is lower than [`Info`](Verbosity::Info).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Log **nothing**.
    Off,

    /// Log at level [`ERROR`](tracing_core::metadata::Level::ERROR) only.
    Error,

    /// Log at level [`WARN`](tracing_core::metadata::Level::WARN) and lower.
    Warn,

    /// Log at level [`INFO`](tracing_core::metadata::Level::INFO) and lower.
    #[default]
    Info,

    /// Log at level [`DEBUG`](tracing_core::metadata::Level::DEBUG) and lower.
    Debug,

    /// Log **everything**.
    Trace,
}

/// Represents a failure to parse a [`Verbosity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown verbosity level '{0}' (expected off, error, warn, info, debug or trace)")]
pub struct ParseVerbosityError(String);

impl Verbosity {
    /// All levels, from the least to the most verbose.
    pub const ALL: [Verbosity; 6] = [
        Self::Off,
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Trace,
    ];

    /// The canonical lowercase name of this level.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Translates this [`Verbosity`] level to the `tracing` crate’s
    /// [`LevelFilter`](TracingLevelFilter).
    pub fn to_tracing_level_filter(&self) -> TracingLevelFilter {
        match self {
            Self::Off => TracingLevelFilter::OFF,
            Self::Error => TracingLevelFilter::ERROR,
            Self::Warn => TracingLevelFilter::WARN,
            Self::Info => TracingLevelFilter::INFO,
            Self::Debug => TracingLevelFilter::DEBUG,
            Self::Trace => TracingLevelFilter::TRACE,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ParseVerbosityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let level = match input.trim().to_ascii_lowercase().as_str() {
            "off" | "no" | "none" | "false" => Self::Off,
            "error" | "err" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => return Err(ParseVerbosityError(input.to_string())),
        };

        Ok(level)
    }
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Verbosity> for TracingLevelFilter {
    fn from(value: Verbosity) -> Self {
        value.to_tracing_level_filter()
    }
}

impl From<&Verbosity> for TracingLevelFilter {
    fn from(value: &Verbosity) -> Self {
        value.to_tracing_level_filter()
    }
}

impl From<TracingLevelFilter> for Verbosity {
    fn from(value: TracingLevelFilter) -> Self {
        Self::ALL
            .into_iter()
            .find(|level| level.to_tracing_level_filter() == value)
            .unwrap_or(Self::Trace)
    }
}

const _: () = {
    impl<'de> Deserialize<'de> for Verbosity {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_str(VerbosityVisitor)
        }
    }

    struct VerbosityVisitor;

    impl<'de> Visitor<'de> for VerbosityVisitor {
        type Value = Verbosity;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("a verbosity level such as 'info' or 'debug'")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Verbosity::from_str(value).map_err(E::custom)
        }

        // YAML 1.1 documents read a bare `off` as `false`
        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value {
                Err(E::invalid_value(de::Unexpected::Bool(value), &self))
            } else {
                Ok(Verbosity::Off)
            }
        }
    }
};

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

/// Implements the [`App`] state machine.
mod app;
pub use self::app::{App, AppError, AppOutcome, StartupError};

/// Implements the start-up sequence behind [`App`].
mod launchpad;

/// Implements the [`Extension`] protocol and the built-in configuration
/// extension.
mod extension;
pub use self::extension::{ConfigExtension, ConfigSlot, Extension, ExtensionError};

/// Implements the decode passes over the configuration document.
mod pipeline;
pub use self::pipeline::{ConfigLoadError, ConfigLoader, InitializeError};

/// Implements the [`CoreSettings`] configuration section.
mod settings;
pub use self::settings::CoreSettings;

/// Owns the logging sinks of a running application.
mod logging;

/// Wires the crash monitor into the application.
mod crash;

/// Re-exports the public API of `keel-core` in the root of this crate for
/// convenience.
pub use keel_core::*;

/// Re-exports the public API of `tokio` for convenience.
pub use tokio;

/// Re-exports the public API of `keel-config` for convenience.
pub use keel_config as config;

/// Re-exports the public API of `keel-tracing` for convenience.
pub use keel_tracing as logger;

/// Re-exports the public API of `keel-sentry` for convenience.
pub use keel_sentry as sentry;

/// Partly re-exports the public API of `tracing` for convenience.
pub use tracing;

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

/// Exposes an application configuration section.
mod config;
pub use self::config::SentryConfig;

/// Implements initialization logic for Sentry integration.
mod integration;
pub use self::integration::{SentryInitError, SentryIntegration};
pub use sentry::ClientInitGuard as SentryGuard;
pub use sentry::ClientOptions;

/// Transformations of outgoing events.
mod processor;
pub use self::processor::{EventProcessor, ProcessorChain, TrimPath};

/// Reporting panics observed by the crash monitor.
mod panic;
pub use self::panic::{panic_event, report_panic};

/// Implements a customized [`SentryLayer`](sentry_tracing::SentryLayer) that
/// can be integrated into the [`Subscriber`](::tracing::Subscriber) for setting
/// up the [`tracing`](::tracing) crate.
pub mod tracing;

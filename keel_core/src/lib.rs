#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

/// Application context: shutdown notification and worker tracking.
mod context;
pub use self::context::AppContext;

/// OS termination signals.
mod signal;
pub use self::signal::TerminationSignal;

/// Process-wide panic hook.
mod crash;
pub use self::crash::{
    CrashMonitor, CrashMonitorConfig, CrashMonitorError, PanicCallback, PanicLocation, PanicReport,
};

/// Process-wide timestamp policy.
mod time;
pub use self::time::TimePolicy;

/// Implements a [`Pivot`] facade for centralized resolution of the pivot directory
mod pivot;
pub use self::pivot::Pivot;

/// Globally recognized field name that, when present in a `tracing` macro call,
/// forces an event for the external error-reporting sink (or a breadcrumb, when
/// its value is `"breadcrumb"`).
pub const ALERT_FIELD_NAME: &str = "alert";

/// Globally recognized field name marking `tracing` events that describe a
/// panic already captured by the [`CrashMonitor`].
pub const PANIC_FIELD_NAME: &str = "panic";

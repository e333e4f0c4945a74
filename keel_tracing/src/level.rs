use crate::Verbosity;
use parking_lot::RwLock;
use thiserror::Error;
use tracing_core::LevelFilter;
use tracing_subscriber::{Registry, reload};

type LevelHandle = reload::Handle<LevelFilter, Registry>;

static HANDLE: RwLock<Option<LevelHandle>> = RwLock::new(None);

/// The process-wide log level, adjustable at runtime from any thread.
///
/// The level is enforced by the [layer](LogLevel::layer) that sits directly
/// on top of the [`Registry`]. Until such a layer is built, both accessors
/// fail with [`LogLevelError::Uninitialized`].
pub struct LogLevel;

/// Represents the ways reading or changing the [`LogLevel`] may fail.
#[derive(Debug, Error)]
pub enum LogLevelError {
    /// No logger has been built yet.
    #[error("the logger is not initialized")]
    Uninitialized,

    /// The subscriber holding the level layer is gone.
    #[error("failed to access the log level: {0}")]
    Reload(#[from] reload::Error),
}

impl LogLevel {
    /// Builds the reloadable level layer starting at the given verbosity
    /// and makes it the target of [`get`](LogLevel::get) and
    /// [`set`](LogLevel::set). A later call retargets both accessors to the
    /// newer layer.
    pub fn layer(initial: Verbosity) -> reload::Layer<LevelFilter, Registry> {
        let (layer, handle) = reload::Layer::new(initial.to_tracing_level_filter());
        *HANDLE.write() = Some(handle);

        layer
    }

    /// Reports whether a level layer has been built.
    pub fn is_initialized() -> bool {
        HANDLE.read().is_some()
    }

    /// The current process-wide level.
    pub fn get() -> Result<Verbosity, LogLevelError> {
        let guard = HANDLE.read();
        let handle = guard.as_ref().ok_or(LogLevelError::Uninitialized)?;

        Ok(handle.with_current(|filter| Verbosity::from(*filter))?)
    }

    /// Changes the process-wide level. Takes effect for every thread, for
    /// events recorded after the call returns.
    pub fn set(verbosity: Verbosity) -> Result<(), LogLevelError> {
        let guard = HANDLE.read();
        let handle = guard.as_ref().ok_or(LogLevelError::Uninitialized)?;

        handle.reload(verbosity.to_tracing_level_filter())?;

        Ok(())
    }
}

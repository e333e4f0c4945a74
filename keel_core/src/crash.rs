use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A callback invoked by the [`CrashMonitor`] for every observed panic.
pub type PanicCallback = Arc<dyn Fn(&PanicReport) + Send + Sync>;

/// Facade over the process-wide panic hook.
///
/// Once [started](CrashMonitor::start), every panic in the process (on any
/// thread, caught or not) is turned into a [`PanicReport`] and handed to each
/// configured callback, in order. Afterwards, the hook that was installed
/// before the monitor started runs as well, unless
/// [disabled](CrashMonitorConfig::chain_previous_hook).
///
/// The monitor can be started at most once per process.
pub struct CrashMonitor;

/// Describes what the [`CrashMonitor`] does with an observed panic.
#[derive(Clone)]
pub struct CrashMonitorConfig {
    callbacks: Vec<PanicCallback>,
    chain_previous_hook: bool,
}

/// Everything known about one panic at the moment it happens.
#[derive(Debug, Clone)]
pub struct PanicReport {
    message: String,
    location: Option<PanicLocation>,
    thread: Option<String>,
    backtrace: String,
}

/// Source location of a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicLocation {
    /// Source file
    pub file: String,
    /// Line, starting at 1
    pub line: u32,
    /// Column, starting at 1
    pub column: u32,
}

/// Represents the ways starting the [`CrashMonitor`] may fail.
#[derive(Debug, Error)]
pub enum CrashMonitorError {
    /// The monitor is already installed for this process.
    #[error("crash monitor is already started")]
    AlreadyStarted,
}

static STARTED: AtomicBool = AtomicBool::new(false);

impl CrashMonitor {
    /// Installs the process-wide panic hook with the given configuration.
    pub fn start(config: CrashMonitorConfig) -> Result<(), CrashMonitorError> {
        if STARTED.swap(true, Ordering::AcqRel) {
            return Err(CrashMonitorError::AlreadyStarted);
        }

        let previous = std::panic::take_hook();
        let previous = config.chain_previous_hook.then_some(previous);

        std::panic::set_hook(Box::new(move |info| {
            let report = PanicReport::from_hook(info);

            for callback in &config.callbacks {
                callback(&report);
            }

            if let Some(previous) = &previous {
                previous(info);
            }
        }));

        Ok(())
    }

    /// Reports whether the monitor has been started in this process.
    pub fn is_started() -> bool {
        STARTED.load(Ordering::Acquire)
    }
}

impl CrashMonitorConfig {
    /// Creates a configuration without callbacks that chains to the
    /// previously installed hook.
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            chain_previous_hook: true,
        }
    }

    /// Appends a callback to run for every observed panic.
    pub fn on_panic(&mut self, callback: impl Fn(&PanicReport) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    /// Decides whether the hook installed before the monitor still runs
    /// after the callbacks (by default it does).
    pub fn chain_previous_hook(&mut self, chain: bool) -> &mut Self {
        self.chain_previous_hook = chain;
        self
    }

    /// Removes every configured callback.
    pub fn clear(&mut self) -> &mut Self {
        self.callbacks.clear();
        self
    }

    /// The number of configured callbacks.
    pub fn callbacks(&self) -> usize {
        self.callbacks.len()
    }
}

impl Default for CrashMonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CrashMonitorConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashMonitorConfig")
            .field("callbacks", &self.callbacks.len())
            .field("chain_previous_hook", &self.chain_previous_hook)
            .finish()
    }
}

impl PanicReport {
    fn from_hook(info: &PanicHookInfo<'_>) -> Self {
        let location = info.location().map(|location| PanicLocation {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        });

        Self {
            message: Self::describe_payload(info.payload()),
            location,
            thread: std::thread::current().name().map(str::to_string),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    /// Creates a report for a panic observed outside the panic hook (e.g., a
    /// payload caught at a worker boundary). The backtrace is left empty.
    pub fn new(message: impl Into<String>, location: Option<PanicLocation>) -> Self {
        Self {
            message: message.into(),
            location,
            thread: std::thread::current().name().map(str::to_string),
            backtrace: String::new(),
        }
    }

    /// Renders a panic payload as text. Payloads that are neither `&str`
    /// nor `String` are described generically.
    pub fn describe_payload(payload: &(dyn Any + Send)) -> String {
        if let Some(message) = payload.downcast_ref::<&str>() {
            return message.to_string();
        }

        if let Some(message) = payload.downcast_ref::<String>() {
            return message.clone();
        }

        "non-textual panic payload".to_string()
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the panic happened, when known.
    pub fn location(&self) -> Option<&PanicLocation> {
        self.location.as_ref()
    }

    /// The name of the panicking thread, when it has one.
    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    /// The rendered backtrace captured inside the hook.
    pub fn backtrace(&self) -> &str {
        &self.backtrace
    }
}

impl Display for PanicReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;

        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }

        Ok(())
    }
}

impl Display for PanicLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_descriptions() {
        assert_eq!(PanicReport::describe_payload(&"static"), "static");
        assert_eq!(
            PanicReport::describe_payload(&String::from("owned")),
            "owned",
        );
        assert_eq!(
            PanicReport::describe_payload(&42_u8),
            "non-textual panic payload",
        );
    }

    #[test]
    fn report_display() {
        // Given
        let report = PanicReport {
            message: "boom".to_string(),
            location: Some(PanicLocation {
                file: "src/main.rs".to_string(),
                line: 7,
                column: 5,
            }),
            thread: Some("main".to_string()),
            backtrace: String::new(),
        };

        // Then
        assert_eq!(report.to_string(), "boom at src/main.rs:7:5");
    }

    #[test]
    fn config_builder() {
        // Given
        let mut config = CrashMonitorConfig::new();

        // When
        config.on_panic(|_| {}).on_panic(|_| {}).chain_previous_hook(false);

        // Then
        assert_eq!(config.callbacks(), 2);
        assert!(!config.chain_previous_hook);

        // When
        config.clear();

        // Then
        assert_eq!(config.callbacks(), 0);
    }
}

use crate::extension::{ConfigExtension, ConfigSlot, Extension, ExtensionError, ExtensionRecord};
use crate::launchpad::{Launchpad, Mode};
use crate::pipeline::{ConfigLoadError, InitializeError};
use keel_config::{DecodeError, DocumentError, EnvOverrides, HookChain, LocateError, Validate};
use keel_core::{AppContext, CrashMonitorConfig, CrashMonitorError, TerminationSignal};
use keel_sentry::{ClientOptions, SentryInitError};
use keel_tracing::TracingConfig;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::error;
use tracing_subscriber::util::TryInitError;

type TracingOverride = Box<dyn FnOnce(&mut TracingConfig) + Send>;
type SentryOverride = Box<dyn FnOnce(&mut ClientOptions) + Send>;
type CrashMonitorOverride = Box<dyn FnOnce(&mut CrashMonitorConfig, &AppContext) + Send>;
type LogOutput = Box<dyn io::Write + Send>;

/// A long-running application: its configuration, its extensions, and its
/// lifecycle.
///
/// An `App` is configured through its `with_*` methods and then started
/// exactly once, with either [`run`](App::run) or [`start`](App::start) (or
/// their `try_*` siblings). Starting it a second time, or configuring it
/// after it was started, panics with `"application has already been
/// started"`. This holds for concurrent calls too: exactly one of them
/// starts the application.
///
/// ## Start-up
///
/// Starting the application:
///
/// 1. subscribes to the termination signals,
/// 2. loads the configuration file (named by the `--config <PATH>` flag,
///    `config.yaml` by default) and decodes the core settings from its `app`
///    section,
/// 3. builds the global logger and, when a DSN is configured, binds a Sentry
///    client,
/// 4. starts the crash monitor, when `app.panicwatch` is set,
/// 5. initializes and then starts every [`Extension`], in registration
///    order,
/// 6. runs the entry point as a worker.
///
/// ## Example
///
/// ```no_run
/// use keel::App;
///
/// fn main() {
///     App::new().start(|ctx| async move {
///         let worker_ctx = ctx.clone();
///         ctx.start_worker(async move {
///             worker_ctx.terminated().await;
///             tracing::info!("Cleaning up");
///         });
///     });
/// }
/// ```
pub struct App {
    started: AtomicBool,
    setup: Mutex<Setup>,
}

/// Everything an [`App`] is configured with before it starts.
#[derive(Default)]
pub(crate) struct Setup {
    pub(crate) config_file: Option<PathBuf>,
    pub(crate) env_overrides: Option<EnvOverrides>,
    pub(crate) signals: Vec<TerminationSignal>,
    pub(crate) extensions: Vec<ExtensionRecord>,
    pub(crate) tracing_override: Option<TracingOverride>,
    pub(crate) sentry_override: Option<SentryOverride>,
    pub(crate) crash_monitor_override: Option<CrashMonitorOverride>,
    pub(crate) log_output: Option<LogOutput>,
}

/// Describes how an application ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOutcome {
    /// The entry point returned before a shutdown was requested.
    Completed,
    /// A shutdown was requested (e.g., by a termination signal) before the
    /// entry point returned. Always the case for [`App::try_start`].
    Terminated,
}

/// Represents the ways an application may end abnormally.
#[derive(Debug, Error)]
pub enum AppError {
    /// The application could not start. No worker has run.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Some workers panicked. The application shut down and waited for the
    /// remaining workers.
    #[error("{faults} worker(s) panicked")]
    WorkerFault {
        /// The number of panicked workers
        faults: usize,
    },

    /// A repeated termination signal arrived while workers were still
    /// running. They were left behind.
    #[error("gave up waiting for {workers} worker(s) after a repeated termination signal")]
    Abandoned {
        /// The number of workers still running at that point
        workers: usize,
    },
}

/// Represents the ways starting an application may fail.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The async runtime could not be built.
    #[error("failed to build the async runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The termination signals could not be subscribed to.
    #[error("failed to listen for termination signals: {0}")]
    Signals(#[source] io::Error),

    /// The configuration file could not be located.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The configuration file could not be read or parsed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The core settings could not be decoded.
    #[error("failed to decode the application settings: {0}")]
    Settings(#[source] DecodeError),

    /// The global logger could not be installed.
    #[error("failed to initialize the logger: {0}")]
    Logger(#[from] TryInitError),

    /// The Sentry client could not be initialized.
    #[error(transparent)]
    Sentry(#[from] SentryInitError),

    /// The crash monitor could not be started.
    #[error("failed to start the crash monitor: {0}")]
    CrashMonitor(#[from] CrashMonitorError),

    /// An extension failed to initialize.
    #[error(transparent)]
    Extension(#[from] InitializeError),
}

impl App {
    /// Creates an application with no extensions that observes the default
    /// [termination signals](TerminationSignal::DEFAULTS).
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            setup: Mutex::new(Setup::default()),
        }
    }

    /// Reports whether this application has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Reads the configuration from the given file instead of the one named
    /// on the command line. A relative path that does not resolve against
    /// the working directory is tried next to the executable.
    pub fn with_config_file(&self, path: impl Into<PathBuf>) -> &Self {
        let path = path.into();
        self.configure(|setup| setup.config_file = Some(path))
    }

    /// Lets environment variables override the configuration file. With the
    /// prefix `APP`, the variable `APP_APP__LOGGER__VERBOSITY` overrides
    /// `app.logger.verbosity`.
    pub fn with_env_overrides(&self, prefix: impl Into<String>) -> &Self {
        let overrides = EnvOverrides::new(prefix);
        self.configure(|setup| setup.env_overrides = Some(overrides))
    }

    /// Adds termination signals to observe. When none are added, the
    /// [defaults](TerminationSignal::DEFAULTS) are observed.
    pub fn with_termination_signals(
        &self,
        signals: impl IntoIterator<Item = TerminationSignal>,
    ) -> &Self {
        self.configure(|setup| setup.signals.extend(signals))
    }

    /// Registers an extension.
    pub fn with_extension(&self, extension: impl Extension) -> &Self {
        let record = ExtensionRecord::new(extension);
        self.configure(|setup| setup.extensions.push(record))
    }

    /// Decodes the configuration document into `T` and stores the result in
    /// the given slot before the entry point runs.
    pub fn with_config<T>(&self, slot: ConfigSlot<T>) -> &Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.with_extension(ConfigExtension::new(slot))
    }

    /// Like [`with_config`](App::with_config), and also
    /// [validates](Validate) the decoded settings. Invalid settings abort the
    /// start-up, reporting every problem found.
    pub fn with_validated_config<T>(&self, slot: ConfigSlot<T>) -> &Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        self.with_extension(ConfigExtension::validated(slot))
    }

    /// Like [`with_config`](App::with_config), running the given hooks
    /// before the global and built-in ones.
    pub fn with_config_hooks<T>(&self, slot: ConfigSlot<T>, hooks: HookChain) -> &Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.with_extension(ConfigExtension::new(slot).with_hooks(hooks))
    }

    /// Adjusts the logger config decoded from `app.logger` before the logger
    /// is built.
    pub fn with_tracing_config(
        &self,
        customize: impl FnOnce(&mut TracingConfig) + Send + 'static,
    ) -> &Self {
        let customize: TracingOverride = Box::new(customize);
        self.configure(|setup| setup.tracing_override = Some(customize))
    }

    /// Sends the formatted log output to the given sink instead of stdout.
    /// Lines are written from a background thread and flushed when the
    /// application ends.
    pub fn with_log_output(&self, output: impl io::Write + Send + 'static) -> &Self {
        let output: LogOutput = Box::new(output);
        self.configure(|setup| setup.log_output = Some(output))
    }

    /// Adjusts the Sentry client options derived from `app.sentry` before
    /// the client is bound. Only called when a DSN is configured.
    pub fn with_sentry_config(
        &self,
        customize: impl FnOnce(&mut ClientOptions) + Send + 'static,
    ) -> &Self {
        let customize: SentryOverride = Box::new(customize);
        self.configure(|setup| setup.sentry_override = Some(customize))
    }

    /// Adjusts the crash monitor's reaction to panics before it starts. Only
    /// called when `app.panicwatch` is set.
    pub fn with_crash_monitor_config(
        &self,
        customize: impl FnOnce(&mut CrashMonitorConfig, &AppContext) + Send + 'static,
    ) -> &Self {
        let customize: CrashMonitorOverride = Box::new(customize);
        self.configure(|setup| setup.crash_monitor_override = Some(customize))
    }

    fn configure(&self, change: impl FnOnce(&mut Setup)) -> &Self {
        let mut setup = self.setup.lock();
        if self.is_started() {
            drop(setup);
            panic!("application has already been started");
        }

        change(&mut setup);

        self
    }
}

impl App {
    /// Runs the application until the entry point returns or a shutdown is
    /// requested, then waits for every worker to finish.
    ///
    /// When the entry point returns, a shutdown is requested, so that
    /// workers waiting for it can clean up.
    ///
    /// Exits the process with a non-zero status when the application fails
    /// to start or a worker panics.
    ///
    /// ## Panics
    ///
    /// Panics if the application has already been started.
    pub fn run<F, Fut>(&self, entry: F)
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        exit_on_error(self.try_run(entry));
    }

    /// Starts the application and keeps it alive until a shutdown is
    /// requested, then waits for every worker to finish.
    ///
    /// The entry point is expected to [start workers](AppContext::start_worker)
    /// and return quickly; its return does not shut the application down.
    ///
    /// Exits the process with a non-zero status when the application fails
    /// to start or a worker panics.
    ///
    /// ## Panics
    ///
    /// Panics if the application has already been started.
    pub fn start<F, Fut>(&self, entry: F)
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        exit_on_error(self.try_start(entry));
    }

    /// Like [`run`](App::run), but returns failures instead of exiting.
    pub fn try_run<F, Fut>(&self, entry: F) -> Result<AppOutcome, AppError>
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Launchpad::new(self.claim()).launch(Mode::Run, entry)
    }

    /// Like [`start`](App::start), but returns failures instead of exiting.
    pub fn try_start<F, Fut>(&self, entry: F) -> Result<AppOutcome, AppError>
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Launchpad::new(self.claim()).launch(Mode::Start, entry)
    }

    /// Marks this application as started and takes its setup.
    fn claim(&self) -> Setup {
        let mut setup = self.setup.lock();
        if self.started.swap(true, Ordering::AcqRel) {
            drop(setup);
            panic!("application has already been started");
        }

        std::mem::take(&mut *setup)
    }
}

impl StartupError {
    /// Reports whether this failure happened before the logger was built,
    /// so that nothing has logged it.
    pub fn precedes_logger(&self) -> bool {
        matches!(
            self,
            Self::Runtime(_)
                | Self::Signals(_)
                | Self::Locate(_)
                | Self::Document(_)
                | Self::Settings(_)
                | Self::Logger(_),
        )
    }

    /// Logs this failure. Validation failures of an extension list every
    /// problem, unless there is just one.
    pub(crate) fn log(&self) {
        match self {
            Self::Extension(InitializeError {
                extension,
                source: ExtensionError::Config(ConfigLoadError::Validation(errors)),
            }) if errors.len() > 1 => {
                let errors = errors.iter().collect::<Vec<_>>();
                error!(%extension, ?errors, "Extension configuration validation failed");
            }
            Self::Extension(InitializeError {
                extension,
                source: ExtensionError::Config(ConfigLoadError::Validation(errors)),
            }) => {
                error!(%extension, error = %errors, "Extension configuration validation failed");
            }
            Self::Extension(InitializeError { extension, source }) => {
                error!(%extension, error = %source, "Extension failed to initialize");
            }
            other => {
                error!(error = %other, "Application failed to start");
            }
        }
    }
}

fn exit_on_error(result: Result<AppOutcome, AppError>) {
    let error = match result {
        Ok(_) => return,
        Err(error) => error,
    };

    if let AppError::Startup(StartupError::Locate(LocateError::Cli(error))) = &error {
        // Covers `--help` and `--version`, which exit successfully
        error.exit();
    }

    if let AppError::Startup(error) = &error {
        if error.precedes_logger() {
            eprintln!("{error}");
        }
    }

    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_config::ValidationErrors;
    use pretty_assertions::assert_eq;

    fn validation_failure(messages: &[&str]) -> StartupError {
        let mut errors = ValidationErrors::new();
        for message in messages {
            errors.push(message);
        }

        StartupError::Extension(InitializeError {
            extension: "pool".to_string(),
            source: ExtensionError::Config(ConfigLoadError::Validation(errors)),
        })
    }

    #[test]
    fn startup_error_messages() {
        // Given
        let many = validation_failure(&["max must be positive", "name must not be empty"]);
        let one = validation_failure(&["name must not be empty"]);

        // Then
        assert_eq!(
            many.to_string(),
            "extension 'pool' failed to initialize: configuration validation failed: \
             2 errors: [max must be positive; name must not be empty]",
        );
        assert_eq!(
            one.to_string(),
            "extension 'pool' failed to initialize: configuration validation failed: \
             name must not be empty",
        );
        assert!(!one.precedes_logger());
    }

    #[test]
    fn configuration_is_collected() {
        // Given
        let app = App::new();

        // When
        app.with_config_file("service.yaml")
            .with_termination_signals([TerminationSignal::Quit])
            .with_termination_signals([TerminationSignal::User1])
            .with_config(ConfigSlot::<u16>::new())
            .with_tracing_config(|config| {
                config.set_colors(true);
            });

        // Then
        let setup = app.setup.lock();
        assert_eq!(setup.config_file, Some(PathBuf::from("service.yaml")));
        assert_eq!(
            setup.signals,
            vec![TerminationSignal::Quit, TerminationSignal::User1],
        );
        assert_eq!(setup.extensions.len(), 1);
        assert!(setup.tracing_override.is_some());
        assert!(!app.is_started());
    }

    #[test]
    #[should_panic(expected = "application has already been started")]
    fn configuration_after_start_panics() {
        // Given
        let app = App::new();
        app.with_config_file("does/not/exist.yaml");
        let _ = app.try_run(|_| async {});

        // When
        app.with_termination_signals([TerminationSignal::Quit]);
    }
}

use keel_sentry::{
    ClientOptions, ProcessorChain, SentryConfig, SentryGuard, SentryInitError, SentryIntegration,
    TrimPath,
};
use keel_tracing::{LogLevel, Registry, SubscriberExt, SubscriberInitExt, TracingConfig};
use std::io::{self, Write};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;

/// Keeps the logging sinks of a running application alive.
///
/// Dropping the guard flushes them: first the Sentry client (pending events
/// are sent within its shutdown timeout), then the log writer (buffered lines
/// are written out).
#[must_use = "dropping the guard flushes and closes the logging sinks"]
pub(crate) struct LoggingGuard {
    sentry: Option<SentryGuard>,
    _writer: WorkerGuard,
}

impl LoggingGuard {
    /// Builds the global logger from the given config: the process-wide
    /// level, the formatted output on a non-blocking writer (stdout unless
    /// another output is given), and the Sentry layer (inert until a Sentry
    /// client is bound).
    pub(crate) fn install(
        config: &TracingConfig,
        output: Option<Box<dyn Write + Send>>,
    ) -> Result<Self, TryInitError> {
        let output = output.unwrap_or_else(|| Box::new(io::stdout()));
        let (writer, writer_guard) = tracing_appender::non_blocking(output);

        Registry::default()
            .with(LogLevel::layer(config.verbosity()))
            .with(keel_tracing::make_layer(config, writer))
            .with(keel_sentry::tracing::make_layer())
            .try_init()?;

        Ok(Self {
            sentry: None,
            _writer: writer_guard,
        })
    }

    /// Binds a Sentry client reporting to the configured DSN. Does nothing,
    /// apart from a warning, when no DSN is configured.
    ///
    /// Outgoing events have the application root stripped from their stack
    /// frame paths.
    pub(crate) fn attach_sentry(
        &mut self,
        config: &SentryConfig,
        customize: impl FnOnce(&mut ClientOptions),
    ) -> Result<(), SentryInitError> {
        if !config.is_enabled() {
            warn!("Sentry DSN is not set; Sentry integration is disabled");
            return Ok(());
        }

        let processors = ProcessorChain::new().with(TrimPath::detect());
        self.sentry = SentryIntegration::init(config, processors, customize)?;

        Ok(())
    }

    /// Reports whether a Sentry client is bound.
    pub(crate) fn has_sentry(&self) -> bool {
        self.sentry.is_some()
    }
}

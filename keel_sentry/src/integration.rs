use crate::{ProcessorChain, SentryConfig};
use sentry::ClientInitGuard as SentryGuard;
use sentry::integrations::backtrace::{AttachStacktraceIntegration, ProcessStacktraceIntegration};
use sentry::integrations::contexts::ContextIntegration;
use sentry::types::{Dsn, ParseDsnError};
use sentry::ClientOptions;
use sentry::protocol::Event;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// A facade for integrating with Sentry.
pub struct SentryIntegration;

/// Represents a failure to initialize the Sentry client.
#[derive(Debug, Error)]
pub enum SentryInitError {
    /// The configured DSN is not a valid Sentry DSN.
    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(#[from] ParseDsnError),
}

impl SentryIntegration {
    /// Builds the [client options](ClientOptions) for the given
    /// [`SentryConfig`], running every outgoing event through the given
    /// processors.
    ///
    /// Sentry's default integrations are replaced: stack traces and OS/runtime
    /// contexts are kept, while panics are left to the
    /// [`CrashMonitor`](keel_core::CrashMonitor) so they are never reported
    /// twice.
    ///
    /// Returns `Ok(None)` when no DSN is configured.
    pub fn client_options(
        config: impl AsRef<SentryConfig>,
        processors: ProcessorChain,
    ) -> Result<Option<ClientOptions>, SentryInitError> {
        let config = config.as_ref();

        if !config.is_enabled() {
            return Ok(None);
        }

        let dsn = Dsn::from_str(config.dsn().unsecure().trim())?;
        let processors = Arc::new(processors);

        let options = ClientOptions {
            dsn: Some(dsn),
            debug: config.debug(),
            release: non_empty(config.release()),
            environment: non_empty(config.environment()),
            sample_rate: config.sample_rate(),
            max_breadcrumbs: config.max_breadcrumbs(),
            attach_stacktrace: config.attach_stacktrace(),
            shutdown_timeout: config.shutdown_timeout(),
            default_integrations: false,
            before_send: Some(Arc::new(move |event: Event<'static>| processors.process(event))),
            ..Default::default()
        }
        .add_integration(AttachStacktraceIntegration)
        .add_integration(ProcessStacktraceIntegration)
        .add_integration(ContextIntegration::default());

        Ok(Some(options))
    }

    /// Initializes Sentry integration and returns the
    /// [client guard](SentryGuard), which flushes pending events when dropped.
    ///
    /// The options built from the config pass through `customize` before the
    /// client starts. Returns `Ok(None)` when no DSN is configured.
    pub fn init(
        config: impl AsRef<SentryConfig>,
        processors: ProcessorChain,
        customize: impl FnOnce(&mut ClientOptions),
    ) -> Result<Option<SentryGuard>, SentryInitError> {
        let Some(mut options) = Self::client_options(config, processors)? else {
            return Ok(None);
        };

        customize(&mut options);

        Ok(Some(sentry::init(options)))
    }
}

fn non_empty(value: &str) -> Option<Cow<'static, str>> {
    let value = value.trim();

    (!value.is_empty()).then(|| Cow::Owned(value.to_string()))
}

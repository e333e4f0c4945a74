use keel_config::{DecodeError, Document, HookChain};
use keel_sentry::SentryConfig;
use keel_tracing::TracingConfig;
use serde::Deserialize;

/// The settings of the application core, read from the `app` section of the
/// configuration document.
///
/// Every field is optional in the document. Keys are matched ignoring case
/// and punctuation, so `LocalTime`, `local_time` and `local-time` are the
/// same key.
///
/// The error-reporting settings are read from `app.sentry`. When that key is
/// absent, `app.logger.sentry` is read instead.
#[derive(Debug, Clone, Default)]
pub struct CoreSettings {
    logger: TracingConfig,
    sentry: SentryConfig,
    local_time: bool,
    panicwatch: bool,
}

/// The document root, as far as the core is concerned.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoreDocument {
    app: CoreSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoreSection {
    logger: TracingConfig,
    sentry: Option<SentryConfig>,
    local_time: bool,
    panicwatch: bool,
}

/// The `app.logger.sentry` fallback location of the Sentry settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggerSentryDocument {
    app: LoggerSentryApp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggerSentryApp {
    logger: LoggerSentry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggerSentry {
    sentry: Option<SentryConfig>,
}

impl CoreSettings {
    /// Decodes the `app` section of the given document with the given hooks.
    /// Everything outside of that section is ignored.
    pub fn decode(document: &Document, hooks: &HookChain) -> Result<Self, DecodeError> {
        let CoreSection {
            logger,
            sentry,
            local_time,
            panicwatch,
        } = document.decode::<CoreDocument>(hooks)?.app;

        let sentry = match sentry {
            Some(sentry) => sentry,
            None => document
                .decode::<LoggerSentryDocument>(hooks)?
                .app
                .logger
                .sentry
                .unwrap_or_default(),
        };

        Ok(Self {
            logger,
            sentry,
            local_time,
            panicwatch,
        })
    }

    /// The logger settings.
    pub fn logger(&self) -> &TracingConfig {
        &self.logger
    }

    /// The error-reporting settings.
    pub fn sentry(&self) -> &SentryConfig {
        &self.sentry
    }

    /// Whether timestamps are rendered in the local timezone rather than in
    /// UTC.
    pub fn local_time(&self) -> bool {
        self.local_time
    }

    /// Whether the crash monitor is started.
    pub fn panicwatch(&self) -> bool {
        self.panicwatch
    }
}

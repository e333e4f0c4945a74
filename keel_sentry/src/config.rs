use keel_deserialize::SlugIndex;
use secure_string::SecureString;
use serde::de::{Error, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::Formatter;
use std::time::Duration;

/// Represents the application-level configuration section that covers everything
/// related to Sentry integration.
///
/// This config comes with a custom [`Deserialize`] implementation, to support more
/// human-oriented textual configuration: the section may be a bare DSN string,
/// and keys are matched ignoring case and punctuation.
///
/// The shutdown timeout is decoded as a plain [`Duration`]: human-readable
/// forms such as `2s` are left to the decode hooks of the configuration
/// document, like every other duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SentryConfig {
    dsn: SecureString,
    environment: String,
    release: String,
    debug: bool,
    sample_rate: f32,
    max_breadcrumbs: usize,
    attach_stacktrace: bool,
    shutdown_timeout: Duration,
}

impl SentryConfig {
    /// Creates a default config reporting to the given DSN.
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: SecureString::from(dsn.into()),
            ..Self::default()
        }
    }

    /// Returns the Sentry DSN (Data Source Name), which acts like a connection
    /// string. This value tells the app where to send error reports. An empty
    /// DSN disables the integration.
    pub fn dsn(&self) -> &SecureString {
        &self.dsn
    }

    /// Reports whether a DSN is configured.
    pub fn is_enabled(&self) -> bool {
        !self.dsn.unsecure().trim().is_empty()
    }

    /// Returns the environment name attached to every event (e.g.,
    /// `production`), or an empty string to leave it unset.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns the release name attached to every event, or an empty string
    /// to leave it unset.
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Indicates whether Sentry debug mode is enabled.
    ///
    /// When `true`, the Sentry client will log internal operations (e.g., failed
    /// event deliveries). Useful during development or troubleshooting.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the sample rate for error event reporting (0.0 to 1.0).
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Returns the maximum number of breadcrumbs stored per event.
    pub fn max_breadcrumbs(&self) -> usize {
        self.max_breadcrumbs
    }

    /// Indicates whether stack traces should be automatically attached to events.
    pub fn attach_stacktrace(&self) -> bool {
        self.attach_stacktrace
    }

    /// Returns the maximum time allowed to send any remaining events before
    /// shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: Self::default_dsn(),
            environment: String::new(),
            release: String::new(),
            debug: Self::default_debug(),
            sample_rate: Self::default_sample_rate(),
            max_breadcrumbs: Self::default_max_breadcrumbs(),
            attach_stacktrace: Self::default_attach_stacktrace(),
            shutdown_timeout: Self::default_shutdown_timeout(),
        }
    }
}

impl SentryConfig {
    fn default_dsn() -> SecureString {
        "".into()
    }

    fn default_debug() -> bool {
        false
    }

    fn default_sample_rate() -> f32 {
        1.0
    }

    fn default_max_breadcrumbs() -> usize {
        64
    }

    fn default_attach_stacktrace() -> bool {
        true
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(2)
    }
}

impl AsRef<SentryConfig> for SentryConfig {
    fn as_ref(&self) -> &SentryConfig {
        self
    }
}

const _: () = {
    const FIELDS: &[&str] = &[
        "dsn",
        "environment",
        "release",
        "debug",
        "sample_rate",
        "max_breadcrumbs",
        "attach_stacktrace",
        "shutdown_timeout",
    ];

    impl<'de> Deserialize<'de> for SentryConfig {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(SentryConfigVisitor)
        }
    }

    struct SentryConfigVisitor;

    impl<'de> Visitor<'de> for SentryConfigVisitor {
        type Value = SentryConfig;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("a map of Sentry integration configuration or a string Sentry DSN")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(SentryConfig::default())
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(SentryConfig::with_dsn(value))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(SentryConfig::with_dsn(value))
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let index = SlugIndex::new(FIELDS);
            let mut config = SentryConfig::default();

            while let Some(key) = map.next_key::<String>()? {
                match index.resolve(&key) {
                    Some("dsn") => config.dsn = map.next_value()?,
                    Some("environment") => config.environment = map.next_value()?,
                    Some("release") => config.release = map.next_value()?,
                    Some("debug") => config.debug = map.next_value()?,
                    Some("sample_rate") => config.sample_rate = map.next_value()?,
                    Some("max_breadcrumbs") => config.max_breadcrumbs = map.next_value()?,
                    Some("attach_stacktrace") => config.attach_stacktrace = map.next_value()?,
                    Some("shutdown_timeout") => config.shutdown_timeout = map.next_value()?,
                    _ => {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
            }

            Ok(config)
        }
    }
};

#[cfg(test)]
mod tests {
    use crate::SentryConfig;
    use keel_config::{Document, HookChain};
    use pretty_assertions::assert_eq;
    use secure_string::SecureString;
    use std::time::Duration;

    #[test]
    fn from_empty() {
        // Given
        let input = "{}";
        let expected_output = SentryConfig::default();

        // When
        let actual_output = serde_yml::from_str::<SentryConfig>(input).unwrap();

        // Then
        assert_eq!(expected_output, actual_output);
        assert!(!actual_output.is_enabled());
    }

    #[test]
    fn from_string() {
        // Given
        let input = "some_dsn";
        let expected_output = SentryConfig {
            dsn: SecureString::from("some_dsn"),
            ..SentryConfig::default()
        };

        // When
        let actual_output = serde_yml::from_str::<SentryConfig>(input).unwrap();

        // Then
        assert_eq!(expected_output, actual_output);
        assert!(actual_output.is_enabled());
    }

    #[test]
    fn from_map_sparse() {
        // Given
        let input = r#"
DSN: some_dsn
Environment: staging
"#;
        let expected_output = SentryConfig {
            dsn: SecureString::from("some_dsn"),
            environment: "staging".to_string(),
            ..SentryConfig::default()
        };

        // When
        let actual_output = serde_yml::from_str::<SentryConfig>(input).unwrap();

        // Then
        assert_eq!(expected_output, actual_output);
    }

    #[test]
    fn from_map_full() {
        // Given
        let input = r#"
dsn: some_dsn
environment: production
release: demo@1.2.3
debug: true
sample-rate: 0.5
MaxBreadcrumbs: 50
attach_stacktrace: false
shutdown_timeout: 1s 500ms
unknown: ignored
"#;
        let expected_output = SentryConfig {
            dsn: SecureString::from("some_dsn"),
            environment: "production".to_string(),
            release: "demo@1.2.3".to_string(),
            debug: true,
            sample_rate: 0.5,
            max_breadcrumbs: 50,
            attach_stacktrace: false,
            shutdown_timeout: Duration::from_millis(1500),
        };

        // When
        let actual_output = decode(input).unwrap();

        // Then
        assert_eq!(expected_output, actual_output);
    }

    #[test]
    fn invalid_timeout() {
        // When
        let result = decode("shutdown_timeout: whenever");

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn structured_timeout_without_hooks() {
        // When
        let config =
            serde_yml::from_str::<SentryConfig>("shutdown_timeout: {secs: 3, nanos: 0}").unwrap();

        // Then
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
    }

    fn decode(input: &str) -> Result<SentryConfig, keel_config::DecodeError> {
        Document::from_yaml(input)
            .unwrap()
            .decode::<SentryConfig>(&HookChain::builtin())
    }
}

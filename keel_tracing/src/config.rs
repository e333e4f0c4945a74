use crate::{FormatFlavor, Verbosity};
use serde::Deserialize;
use std::collections::BTreeMap;

pub mod flavor;
pub mod verbosity;

/// Represents the application-level configuration section that covers everything
/// related to pre-configuring the [formatted layer](tracing_subscriber::fmt::Layer)
/// provided by the `tracing` crate. In essence, this is the application
/// **logging** configuration.
///
/// Two shortcut flags adjust the effective settings: `debug` raises the
/// verbosity to at least [`Debug`](Verbosity::Debug), and `json` forces the
/// [`Json`](FormatFlavor::Json) flavor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    #[serde(alias = "level")]
    verbosity: Verbosity,
    debug: bool,
    json: bool,
    #[serde(alias = "flavour")]
    flavor: FormatFlavor,
    #[serde(alias = "color", alias = "colour", alias = "colours")]
    colors: bool,
    show_timestamp: bool,
    show_target: bool,
    show_file: bool,
    #[serde(alias = "show_line")]
    show_line_number: bool,
    show_level: bool,
    show_thread_id: bool,
    show_thread_name: bool,
    targets: BTreeMap<String, Verbosity>,
}

impl TracingConfig {
    /// Merges an extra per-target [`Verbosity`] level into this config.
    pub fn with_target(
        mut self,
        target: impl Into<String>,
        verbosity: impl Into<Verbosity>,
    ) -> Self {
        self.set_target(target, verbosity);

        self
    }

    /// Merges extra per-target [`Verbosity`] levels into this config.
    pub fn with_targets<T, L>(mut self, targets: impl IntoIterator<Item = (T, L)>) -> Self
    where
        T: Into<String>,
        L: Into<Verbosity>,
    {
        for (target, verbosity) in targets.into_iter() {
            self.set_target(target, verbosity);
        }

        self
    }

    /// Merges an extra per-target [`Verbosity`] level into this config, in
    /// place.
    pub fn set_target(
        &mut self,
        target: impl Into<String>,
        verbosity: impl Into<Verbosity>,
    ) -> &mut Self {
        self.targets.insert(target.into(), verbosity.into());
        self
    }

    /// Replaces the root verbosity level.
    pub fn set_verbosity(&mut self, verbosity: Verbosity) -> &mut Self {
        self.verbosity = verbosity;
        self
    }

    /// Replaces the formatting flavor.
    pub fn set_flavor(&mut self, flavor: FormatFlavor) -> &mut Self {
        self.flavor = flavor;
        self
    }

    /// Enables or disables colored output.
    pub fn set_colors(&mut self, colors: bool) -> &mut Self {
        self.colors = colors;
        self
    }

    /// Enables or disables timestamps in the output.
    pub fn set_show_timestamp(&mut self, show_timestamp: bool) -> &mut Self {
        self.show_timestamp = show_timestamp;
        self
    }
}

impl TracingConfig {
    /// Reports the effective root [verbosity level](Verbosity) for this
    /// logging configuration, taking the `debug` flag into account.
    pub fn verbosity(&self) -> Verbosity {
        if self.debug {
            self.verbosity.max(Verbosity::Debug)
        } else {
            self.verbosity
        }
    }

    /// Reports the effective [formatting flavor](FormatFlavor) for this
    /// logging configuration, taking the `json` flag into account.
    pub fn flavor(&self) -> FormatFlavor {
        if self.json {
            FormatFlavor::Json
        } else {
            self.flavor
        }
    }

    /// Reports whether this logging configuration enables
    /// [colored](tracing_subscriber::fmt::Layer::with_ansi) output. JSON
    /// output is never colored.
    pub fn colors(&self) -> bool {
        self.colors && self.flavor() != FormatFlavor::Json
    }

    /// Reports whether this logging configuration includes the
    /// [timestamp](tracing_subscriber::fmt::Layer::without_time) in the output.
    pub fn show_timestamp(&self) -> bool {
        self.show_timestamp
    }

    /// Reports whether this logging configuration includes the
    /// [target](tracing_subscriber::fmt::Layer::with_target) in the output.
    pub fn show_target(&self) -> bool {
        self.show_target
    }

    /// Reports whether this logging configuration includes the
    /// [file](tracing_subscriber::fmt::Layer::with_file) in the output.
    pub fn show_file(&self) -> bool {
        self.show_file
    }

    /// Reports whether this logging configuration includes the
    /// [line number](tracing_subscriber::fmt::Layer::with_line_number) in the
    /// output.
    pub fn show_line_number(&self) -> bool {
        self.show_line_number
    }

    /// Reports whether this logging configuration includes the
    /// [level](tracing_subscriber::fmt::Layer::with_level) in the output.
    pub fn show_level(&self) -> bool {
        self.show_level
    }

    /// Reports whether this logging configuration includes the
    /// [thread ID](tracing_subscriber::fmt::Layer::with_thread_ids) in the
    /// output.
    pub fn show_thread_id(&self) -> bool {
        self.show_thread_id
    }

    /// Reports whether this logging configuration includes the
    /// [thread name](tracing_subscriber::fmt::Layer::with_thread_names) in the
    /// output.
    pub fn show_thread_name(&self) -> bool {
        self.show_thread_name
    }

    /// Reports the
    /// [customized](tracing_subscriber::filter::targets::Targets::with_targets)
    /// per-[target](tracing_subscriber::filter::targets::Targets) verbosity for
    /// this logging configuration.
    pub fn targets(&self) -> &BTreeMap<String, Verbosity> {
        &self.targets
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            debug: false,
            json: false,
            flavor: FormatFlavor::default(),
            colors: false,
            show_timestamp: true,
            show_target: true,
            show_file: false,
            show_line_number: false,
            show_level: true,
            show_thread_id: false,
            show_thread_name: false,
            targets: BTreeMap::default(),
        }
    }
}

impl AsRef<TracingConfig> for TracingConfig {
    fn as_ref(&self) -> &TracingConfig {
        self
    }
}

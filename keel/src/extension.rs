use crate::ConfigLoader;
use crate::pipeline::ConfigLoadError;
use keel_config::{HookChain, Validate, ValidationErrors};
use keel_core::AppContext;
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// A pluggable component of an [`App`](crate::App).
///
/// Every registered extension goes through two calls, in registration
/// order, before the application's entry point runs:
///
/// 1. [`initialize`](Extension::initialize), where it may decode (and
///    validate) its own settings from the configuration document through
///    the given [`ConfigLoader`];
/// 2. [`start`](Extension::start), where it may register workers on the
///    [`AppContext`], open resources, and so on.
///
/// Besides, an extension may contribute [global hooks](Extension::global_hooks)
/// that take part in every decode pass (including the core's own settings),
/// and [decode hooks](Extension::decode_hooks) that apply to its own settings
/// only.
///
/// ## Example
///
/// ```
/// use keel::{AppContext, ConfigLoader, Extension, ExtensionError};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct HeartbeatSettings {
///     heartbeat: Option<Duration>,
/// }
///
/// #[derive(Default)]
/// struct Heartbeat {
///     every: Option<Duration>,
/// }
///
/// impl Extension for Heartbeat {
///     fn initialize(&mut self, loader: &ConfigLoader<'_>) -> Result<(), ExtensionError> {
///         self.every = loader.load::<HeartbeatSettings>()?.heartbeat;
///         Ok(())
///     }
///
///     fn start(&mut self, ctx: &AppContext) {
///         let Some(every) = self.every else {
///             return;
///         };
///
///         let worker_ctx = ctx.clone();
///         ctx.start_worker(async move {
///             loop {
///                 tokio::select! {
///                     _ = worker_ctx.terminated() => break,
///                     _ = tokio::time::sleep(every) => tracing::info!("Still alive"),
///                 }
///             }
///         });
///     }
/// }
/// ```
pub trait Extension: Send + 'static {
    /// The name this extension is reported under, e.g. when its settings
    /// fail to validate. Defaults to the type name.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Hooks that take part in every decode pass: the core settings and the
    /// settings of every extension. Collected once, at registration.
    fn global_hooks(&self) -> HookChain {
        HookChain::new()
    }

    /// Hooks that apply to this extension's own settings only. They run
    /// before the global hooks.
    fn decode_hooks(&self) -> HookChain {
        HookChain::new()
    }

    /// Prepares this extension, typically by decoding its settings. An error
    /// aborts the application start-up.
    fn initialize(&mut self, loader: &ConfigLoader<'_>) -> Result<(), ExtensionError> {
        let _ = loader;

        Ok(())
    }

    /// Starts whatever concurrent work this extension needs. Runs on the
    /// application's runtime, after every extension has been initialized.
    fn start(&mut self, ctx: &AppContext) {
        let _ = ctx;
    }
}

/// Represents the ways an [`Extension`] may fail to initialize.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The extension's settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    /// Any other failure reported by the extension.
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl ExtensionError {
    /// Wraps an arbitrary failure.
    pub fn other(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Other(error.into())
    }
}

/// A registered [`Extension`], with everything the core needs from it
/// captured at registration time.
pub(crate) struct ExtensionRecord {
    name: String,
    global_hooks: HookChain,
    extension: Box<dyn Extension>,
}

impl ExtensionRecord {
    pub(crate) fn new(extension: impl Extension) -> Self {
        Self {
            name: extension.name().to_string(),
            global_hooks: extension.global_hooks(),
            extension: Box::new(extension),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn global_hooks(&self) -> &HookChain {
        &self.global_hooks
    }

    pub(crate) fn extension(&mut self) -> &mut dyn Extension {
        self.extension.as_mut()
    }
}

impl Debug for ExtensionRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRecord")
            .field("name", &self.name)
            .field("global_hooks", &self.global_hooks.len())
            .finish()
    }
}

/// A shared, write-once cell for settings decoded during start-up.
///
/// Hand a clone to [`App::with_config`](crate::App::with_config) (or one of
/// its siblings) and keep another one: once the application's entry point
/// runs, [`get`](ConfigSlot::get) returns the decoded settings.
pub struct ConfigSlot<T> {
    cell: Arc<OnceLock<T>>,
}

impl<T> ConfigSlot<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// The decoded settings, or `None` before they are decoded.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Reports whether the settings have been decoded.
    pub fn is_filled(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Stores the given settings unless the slot is already filled. Returns
    /// whether the value was stored.
    fn fill(&self, value: T) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<T> Clone for ConfigSlot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Default for ConfigSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for ConfigSlot<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConfigSlot").field(&self.cell.get()).finish()
    }
}

type Validator<T> = fn(&T) -> Result<(), ValidationErrors>;

/// The built-in [`Extension`] that decodes caller-defined settings into a
/// [`ConfigSlot`]. It does nothing at start.
pub struct ConfigExtension<T> {
    slot: ConfigSlot<T>,
    hooks: HookChain,
    validator: Option<Validator<T>>,
}

impl<T> ConfigExtension<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Decodes settings into the given slot.
    pub fn new(slot: ConfigSlot<T>) -> Self {
        Self {
            slot,
            hooks: HookChain::new(),
            validator: None,
        }
    }

    /// Runs the given hooks before the global and built-in ones.
    pub fn with_hooks(self, hooks: HookChain) -> Self {
        Self { hooks, ..self }
    }
}

impl<T> ConfigExtension<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    /// Decodes settings into the given slot and [validates](Validate) them.
    pub fn validated(slot: ConfigSlot<T>) -> Self {
        Self {
            validator: Some(T::validate),
            ..Self::new(slot)
        }
    }
}

impl<T> Extension for ConfigExtension<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        type_name::<T>()
    }

    fn decode_hooks(&self) -> HookChain {
        self.hooks.clone()
    }

    fn initialize(&mut self, loader: &ConfigLoader<'_>) -> Result<(), ExtensionError> {
        let settings = loader.load::<T>()?;

        if let Some(validator) = self.validator {
            loader.check(validator(&settings))?;
        }

        self.slot.fill(settings);

        Ok(())
    }
}

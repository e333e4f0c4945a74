use crate::extension::{ExtensionError, ExtensionRecord};
use crate::settings::CoreSettings;
use keel_config::{DecodeError, Document, HookChain, Validate, ValidationErrors};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use thiserror::Error;

/// Decodes the settings of one [`Extension`](crate::Extension) from the
/// configuration document.
///
/// The hooks in effect are the extension's own
/// [decode hooks](crate::Extension::decode_hooks), then the global hooks of
/// every registered extension, then the [built-in](keel_config::builtin)
/// ones.
///
/// Any failure is remembered: an extension that swallows a failed load still
/// aborts the start-up.
pub struct ConfigLoader<'a> {
    document: &'a Document,
    hooks: HookChain,
    extension: &'a str,
    failure: RefCell<Option<ConfigLoadError>>,
}

/// Represents the ways loading extension settings may fail.
#[derive(Debug, Clone, Error)]
pub enum ConfigLoadError {
    /// The document does not fit the settings type.
    #[error("failed to decode the configuration: {0}")]
    Decode(#[from] DecodeError),

    /// The decoded settings are invalid. Carries every problem found.
    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

impl<'a> ConfigLoader<'a> {
    pub(crate) fn new(document: &'a Document, hooks: HookChain, extension: &'a str) -> Self {
        Self {
            document,
            hooks,
            extension,
            failure: RefCell::new(None),
        }
    }

    /// The name of the extension this loader serves.
    pub fn extension(&self) -> &str {
        self.extension
    }

    /// The raw configuration document.
    pub fn document(&self) -> &Document {
        self.document
    }

    /// Decodes the whole document into the given settings type. Keys the
    /// type does not know are ignored.
    pub fn load<T>(&self) -> Result<T, ConfigLoadError>
    where
        T: DeserializeOwned,
    {
        self.document
            .decode::<T>(&self.hooks)
            .map_err(|error| self.remember(ConfigLoadError::Decode(error)))
    }

    /// Decodes the whole document into the given settings type and
    /// [validates](Validate) the result.
    pub fn load_validated<T>(&self) -> Result<T, ConfigLoadError>
    where
        T: DeserializeOwned + Validate,
    {
        let settings = self.load::<T>()?;
        self.check(settings.validate())?;

        Ok(settings)
    }

    /// Turns the outcome of a validation into a load result.
    pub fn check(&self, outcome: Result<(), ValidationErrors>) -> Result<(), ConfigLoadError> {
        outcome.map_err(|errors| self.remember(ConfigLoadError::Validation(errors)))
    }

    fn remember(&self, error: ConfigLoadError) -> ConfigLoadError {
        self.failure.borrow_mut().get_or_insert_with(|| error.clone());

        error
    }

    fn into_failure(self) -> Option<ConfigLoadError> {
        self.failure.into_inner()
    }
}

/// Represents a failure to initialize one extension, attributed to it.
#[derive(Debug, Error)]
#[error("extension '{extension}' failed to initialize: {source}")]
pub struct InitializeError {
    /// The name of the failing extension
    pub extension: String,
    /// What went wrong
    #[source]
    pub source: ExtensionError,
}

/// The decode passes of one start-up: the core settings first, then every
/// extension in registration order.
pub(crate) struct Pipeline<'a> {
    document: &'a Document,
    global: HookChain,
}

impl<'a> Pipeline<'a> {
    /// Collects the global hooks of every registered extension.
    pub(crate) fn new(document: &'a Document, records: &[ExtensionRecord]) -> Self {
        let mut global = HookChain::new();
        for record in records {
            global.extend(record.global_hooks());
        }

        Self { document, global }
    }

    /// Decodes the core settings: built-in hooks first, global hooks after.
    pub(crate) fn core_settings(&self) -> Result<CoreSettings, DecodeError> {
        CoreSettings::decode(self.document, &HookChain::builtin().then(&self.global))
    }

    /// Initializes the given extensions in order, stopping at the first one
    /// that fails.
    pub(crate) fn initialize(&self, records: &mut [ExtensionRecord]) -> Result<(), InitializeError> {
        for record in records.iter_mut() {
            self.initialize_one(record)?;
        }

        Ok(())
    }

    fn initialize_one(&self, record: &mut ExtensionRecord) -> Result<(), InitializeError> {
        let name = record.name().to_string();
        let extension = record.extension();
        let hooks = extension
            .decode_hooks()
            .then(&self.global)
            .then(&HookChain::builtin());

        let loader = ConfigLoader::new(self.document, hooks, &name);
        let outcome = extension.initialize(&loader);
        let failure = loader.into_failure();

        let error = match (outcome, failure) {
            (Err(error), _) => error,
            (Ok(()), Some(failure)) => ExtensionError::Config(failure),
            (Ok(()), None) => return Ok(()),
        };

        Err(InitializeError {
            extension: name,
            source: error,
        })
    }
}

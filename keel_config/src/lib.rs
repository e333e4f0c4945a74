#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

/// Locating the configuration file.
mod locator;
pub use self::locator::{ConfigLocator, LocateError};

/// The parsed configuration document.
mod document;
pub use self::document::{Document, DocumentError, EnvOverrides};

/// Kinds of values and decoding targets.
mod kind;
pub use self::kind::{SourceKind, TargetKind};

/// Decode hooks and their composition.
mod hook;
pub use self::hook::{DecodeHook, HookChain, KeyedHook};

/// Conversions every decode pass knows about.
pub mod builtin;

/// IP network type understood by the built-in hooks.
mod network;
pub use self::network::{IpNetwork, IpNetworkError};

/// The hooked deserializer and its error.
mod de;
pub use self::de::{DecodeError, HookedDeserializer};

/// The validation contract.
mod validate;
pub use self::validate::{Validate, ValidationErrors};

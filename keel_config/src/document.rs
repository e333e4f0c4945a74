use crate::{DecodeError, HookChain, HookedDeserializer};
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde_value::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The raw configuration document: a tree of maps, sequences and scalars,
/// immutable once parsed.
///
/// Every decode pass (the core settings, each extension's settings) reads
/// the same document independently through [`decode`](Document::decode).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
    origin: Option<PathBuf>,
}

/// Environment variables layered on top of a configuration file.
///
/// With the prefix `APP`, the variable `APP_APP__LOGGER__VERBOSITY` overrides
/// the key `app.logger.verbosity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverrides {
    prefix: String,
}

/// Represents a failure to read or parse a configuration document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read, or is not valid in its format.
    #[error("failed to load configuration file '{}': {source}", .path.display())]
    File {
        /// The file being loaded
        path: PathBuf,
        /// The underlying parser error
        source: config::ConfigError,
    },

    /// In-memory text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Text(#[source] config::ConfigError),
}

impl Document {
    /// Loads the document at the given path, choosing the format by the file
    /// extension (`yaml`/`yml`, `toml`, `json`; anything else is read as
    /// YAML), optionally layering environment overrides on top.
    pub fn load(path: &Path, env: Option<&EnvOverrides>) -> Result<Self, DocumentError> {
        let mut builder = Config::builder()
            .add_source(File::from(path).format(format_of(path)).required(true));

        if let Some(env) = env {
            builder = builder.add_source(env.source());
        }

        let root = builder
            .build()
            .and_then(|config| config.try_deserialize::<Value>())
            .map_err(|source| DocumentError::File {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            root,
            origin: Some(path.to_path_buf()),
        })
    }

    /// Parses a YAML document from memory.
    pub fn from_yaml(text: &str) -> Result<Self, DocumentError> {
        let root = Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize::<Value>())
            .map_err(DocumentError::Text)?;

        Ok(Self::from_value(root))
    }

    /// Wraps an already parsed tree.
    pub fn from_value(root: Value) -> Self {
        Self { root, origin: None }
    }

    /// The root of the tree.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The file this document was loaded from, if any.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Decodes the whole document into the given type, running the given
    /// hooks at every value.
    ///
    /// An empty document decodes like an empty map, so that targets made
    /// entirely of defaulted fields succeed.
    pub fn decode<T>(&self, hooks: &HookChain) -> Result<T, DecodeError>
    where
        T: DeserializeOwned,
    {
        let root = match &self.root {
            Value::Map(_) => self.root.clone(),
            Value::Unit | Value::Option(None) => Value::Map(BTreeMap::new()),
            other => {
                return Err(DecodeError::new(format!(
                    "expected a map at the document root, found {}",
                    crate::SourceKind::of(other),
                )));
            }
        };

        T::deserialize(HookedDeserializer::new(root, hooks))
    }
}

impl EnvOverrides {
    /// The separator between nested keys in variable names.
    pub const SEPARATOR: &'static str = "__";

    /// Creates overrides read from variables starting with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The variable prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn source(&self) -> Environment {
        Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(Self::SEPARATOR)
            .try_parsing(true)
    }
}

fn format_of(path: &Path) -> FileFormat {
    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Server {
        host: String,
        port: u16,
    }

    #[test]
    fn format_by_extension() {
        assert_eq!(format_of(Path::new("app.toml")), FileFormat::Toml);
        assert_eq!(format_of(Path::new("app.JSON")), FileFormat::Json);
        assert_eq!(format_of(Path::new("app.yml")), FileFormat::Yaml);
        assert_eq!(format_of(Path::new("app.conf")), FileFormat::Yaml);
        assert_eq!(format_of(Path::new("app")), FileFormat::Yaml);
    }

    #[test]
    fn load_toml() {
        // Given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "host = \"localhost\"\nport = 8080\n").unwrap();

        // When
        let document = Document::load(&path, None).unwrap();
        let server: Server = document.decode(&HookChain::builtin()).unwrap();

        // Then
        assert_eq!(document.origin(), Some(path.as_path()));
        assert_eq!(
            server,
            Server {
                host: "localhost".to_string(),
                port: 8080,
            },
        );
    }

    #[test]
    fn load_json() {
        // Given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"Host": "example.org"}"#).unwrap();

        // When
        let server: Server = Document::load(&path, None)
            .unwrap()
            .decode(&HookChain::builtin())
            .unwrap();

        // Then
        assert_eq!(server.host, "example.org");
        assert_eq!(server.port, 0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        // Given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        std::fs::write(&path, "host: [unterminated\n").unwrap();

        // When
        let error = Document::load(&path, None).unwrap_err();

        // Then
        assert!(matches!(error, DocumentError::File { .. }));
        assert!(error.to_string().contains("app.yaml"), "{error}");
    }

    #[test]
    fn missing_file_is_an_error() {
        // Given
        let dir = tempfile::tempdir().unwrap();

        // When
        let result = Document::load(&dir.path().join("absent.yaml"), None);

        // Then
        assert!(matches!(result, Err(DocumentError::File { .. })));
    }

    #[test]
    fn empty_document_decodes_defaults() {
        // Given
        let document = Document::from_yaml("").unwrap();

        // When
        let server: Server = document.decode(&HookChain::builtin()).unwrap();

        // Then
        assert_eq!(server, Server::default());
    }

    #[test]
    fn scalar_root_is_rejected() {
        // Given
        let document = Document::from_value(Value::String("just text".into()));

        // When
        let error = document.decode::<Server>(&HookChain::builtin()).unwrap_err();

        // Then
        assert_eq!(error.path(), None);
        assert_eq!(error.message(), "expected a map at the document root, found string");
    }
}

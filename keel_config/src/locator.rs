use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The default configuration file, relative to the working directory.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Finds the configuration file of the application.
///
/// The file is named by the single command-line flag `--config <PATH>`
/// (default `config.yaml`). A path is tried as given first, which resolves
/// relative paths against the working directory. If that fails and the path
/// is relative, it is tried again relative to the directory of the running
/// executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocator {
    requested: PathBuf,
}

/// Represents the ways locating the configuration file may fail.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The command line could not be parsed. This also covers `--help`,
    /// which clap reports as an "error" carrying the help text.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// None of the candidate paths is a readable file.
    #[error("configuration file '{}' not found (tried: {})", .requested.display(), display_paths(.tried))]
    NotFound {
        /// The path as requested
        requested: PathBuf,
        /// Every path that was tried, in order
        tried: Vec<PathBuf>,
    },
}

#[derive(Debug, Parser)]
#[command(about = "Runs the application with the given configuration file")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

impl ConfigLocator {
    /// Creates a locator for an explicitly given path, bypassing the command
    /// line.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            requested: path.into(),
        }
    }

    /// Creates a locator from the command line of this process.
    pub fn from_env() -> Result<Self, LocateError> {
        Self::from_args(std::env::args_os())
    }

    /// Creates a locator from the given command line, whose first item is
    /// the program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, LocateError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)?;

        Ok(Self::new(cli.config))
    }

    /// The path as requested.
    pub fn requested(&self) -> &Path {
        &self.requested
    }

    /// Resolves the requested path to an existing file.
    pub fn locate(&self) -> Result<PathBuf, LocateError> {
        let mut tried = vec![self.requested.clone()];
        if self.requested.is_file() {
            return Ok(self.requested.clone());
        }

        if self.requested.is_relative() {
            if let Some(candidate) = executable_dir().map(|dir| dir.join(&self.requested)) {
                if candidate.is_file() {
                    return Ok(candidate);
                }
                tried.push(candidate);
            }
        }

        Err(LocateError::NotFound {
            requested: self.requested.clone(),
            tried,
        })
    }
}

impl Default for ConfigLocator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

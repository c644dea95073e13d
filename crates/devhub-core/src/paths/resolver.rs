//! Consolidated path resolution for diagnostics.

use std::fmt;
use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::{DATA_DIR_ENV, data_root};

/// Where the data root came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRootSource {
    /// `--data-dir` on the command line.
    Explicit,
    /// The `DEVHUB_DATA_DIR` environment variable.
    EnvVar,
    /// The platform data directory.
    Default,
}

/// Every path devhub uses, resolved once from a single data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_root: PathBuf,
    pub registry_root: PathBuf,
    pub settings_file: PathBuf,
    pub source: DataRootSource,
}

impl ResolvedPaths {
    /// Resolve using the current environment.
    pub fn resolve() -> Result<Self, PathError> {
        let source = match std::env::var(DATA_DIR_ENV) {
            Ok(value) if !value.trim().is_empty() => DataRootSource::EnvVar,
            _ => DataRootSource::Default,
        };
        Ok(Self::from_root(data_root()?, source))
    }

    /// Resolve with an optional explicit data root taking precedence.
    pub fn resolve_with_data_dir(data_dir: Option<&Path>) -> Result<Self, PathError> {
        match data_dir {
            Some(root) => Ok(Self::from_root(root.to_path_buf(), DataRootSource::Explicit)),
            None => Self::resolve(),
        }
    }

    fn from_root(data_root: PathBuf, source: DataRootSource) -> Self {
        Self {
            registry_root: data_root.join("registry"),
            settings_file: data_root.join("settings.json"),
            data_root,
            source,
        }
    }
}

impl fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data_root = {}", self.data_root.display())?;
        writeln!(f, "registry_root = {}", self.registry_root.display())?;
        writeln!(f, "settings_file = {}", self.settings_file.display())?;
        write!(f, "data_root_source = {:?}", self.source)
    }
}

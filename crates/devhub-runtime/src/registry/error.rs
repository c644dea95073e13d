//! Error types for the slot registry.

use std::io;
use std::path::PathBuf;

use devhub_core::PathError;
use thiserror::Error;

/// Errors from `LockedRegistry` operations.
///
/// Lock failures are always propagated: proceeding without the lock could
/// let two daemon instances bind the same port.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Could not create, open or lock the slot's lock file.
    #[error("failed to lock slot '{name}' ({path}): {source}")]
    Lock {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The slot file exists but is not a valid slot document.
    #[error("slot file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

//! Error types for the process supervisor.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by `ProcessSupervisor` operations.
///
/// All of these go back to the immediate caller; the supervisor never logs
/// and swallows them.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A live process is already registered under this id. Nothing changed.
    #[error("process '{id}' is already running")]
    AlreadyRunning { id: String },

    /// The OS refused to spawn the child. The entry stays registered in
    /// state Error for inspection.
    #[error("failed to start process '{id}': {source}")]
    Start {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("no process registered under '{id}'")]
    NotFound { id: String },

    /// The process already reached a terminal state.
    #[error("process '{id}' is not running")]
    NotRunning { id: String },

    /// The caller's wait expired. The stop itself still completes through
    /// SIGKILL escalation.
    #[error("timed out after {waited:?} waiting for process '{id}' to stop")]
    StopTimeout { id: String, waited: Duration },
}

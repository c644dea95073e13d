//! Restart by process-image replacement.

mod binary;
mod exec;

pub use binary::{BinaryVersion, find_upgrade, select_binary};
pub use exec::{ExecRestart, RestartError};

//! Errors reported by a drain.

use std::fmt;
use std::time::Duration;

use devhub_core::{DrainPhase, DrainStepError};
use thiserror::Error;

/// One step that did not drain cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: String,
    pub phase: DrainPhase,
    pub error: DrainStepError,
}

impl StepFailure {
    /// Whether the step was cut off by its share of the drain deadline.
    pub const fn timed_out(&self) -> bool {
        matches!(self.error, DrainStepError::TimedOut(_))
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.step, self.phase, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The deadline passed first, or a step overran its share of it.
    /// Overrunning steps keep running in the background.
    #[error("drain did not finish within {deadline:?}")]
    Timeout { deadline: Duration },

    /// Every step ran, but some of them failed.
    #[error("{} drain step(s) failed: {}", .0.len(), join_failures(.0))]
    StepsFailed(Vec<StepFailure>),

    /// A drain is already in progress or has already run.
    #[error("shutdown is already draining")]
    AlreadyDraining,

    /// The drain task itself died.
    #[error("drain sequence aborted: {0}")]
    Aborted(String),
}

fn join_failures(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

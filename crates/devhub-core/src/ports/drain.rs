//! Drain participant trait used by the shutdown coordinator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Ordered phases of a drain. Steps run phase by phase, and in
/// registration order within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPhase {
    /// Health-check loops for tunnels and domains. They hold references to
    /// process handles, so they stop first.
    HealthChecks,
    /// Port-forwarding manager.
    PortForwarding,
    /// Agent and background-task module.
    Agents,
    /// The process supervisor's `stop_all`.
    Processes,
    /// The HTTP listener's own graceful shutdown.
    HttpListener,
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::HealthChecks => "health-checks",
            Self::PortForwarding => "port-forwarding",
            Self::Agents => "agents",
            Self::Processes => "processes",
            Self::HttpListener => "http-listener",
        };
        f.write_str(label)
    }
}

/// Failure reported by a single drain step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DrainStepError {
    #[error("{0}")]
    Failed(String),

    #[error("drain step panicked: {0}")]
    Panicked(String),

    /// The step used up its share of the drain deadline. It keeps running
    /// detached; later steps are not held up by it.
    #[error("drain step did not finish within {0:?}")]
    TimedOut(Duration),
}

impl DrainStepError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A subsystem that can be asked to stop during shutdown.
///
/// Steps are best-effort: a failing step is recorded and the drain moves on.
#[async_trait]
pub trait DrainStep: Send + Sync {
    /// Short label used in logs and failure reports.
    fn name(&self) -> &str;

    async fn drain(&self) -> Result<(), DrainStepError>;
}

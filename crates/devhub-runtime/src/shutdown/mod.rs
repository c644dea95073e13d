//! Ordered, bounded shutdown.
//!
//! Subsystems register a `DrainStep` under a `DrainPhase`; on shutdown or
//! restart the coordinator runs them in phase order against one deadline.

mod coordinator;
mod error;
mod steps;

pub use coordinator::{CoordinatorConfig, ShutdownCoordinator, ShutdownMode};
pub use error::{ShutdownError, StepFailure};
pub use steps::{FnStep, HttpListenerStep, SupervisorStep};

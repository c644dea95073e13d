//! Port definitions (trait abstractions) the runtime is built against.
//!
//! # Design Rules
//!
//! - No process or filesystem implementation details in signatures
//! - Traits are minimal: one question (is it up?) or one action (drain)

mod drain;
mod health_probe;

pub use drain::{DrainPhase, DrainStep, DrainStepError};
pub use health_probe::HealthProbe;

//! Core domain types, ports and path resolution for devhub.
//!
//! This crate has no OS-process or filesystem-locking concerns; those live in
//! `devhub-runtime`. Everything here is plain data plus the trait seams the
//! runtime plugs into.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{CommandSpec, ProcessSnapshot, ProcessStatus, RegistrySlot, unix_now};
pub use paths::{
    PathError, ResolvedPaths, SlotLocation, data_root, registry_root, settings_path,
};
pub use ports::{DrainPhase, DrainStep, DrainStepError, HealthProbe};
pub use settings::{Settings, SettingsError, validate_settings};

// Silence unused dev-dependency warnings for crates only used by some tests
#[cfg(test)]
use tokio as _;

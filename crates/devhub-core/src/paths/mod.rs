//! Path utilities for devhub data directories and registry slot locations.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - Slot resolution is pure (root + name → paths) so it can be tested
//!   against a temporary directory
//! - OS-specific logic is kept private in `platform`

mod error;
mod platform;
mod resolver;
mod slots;

pub use error::PathError;
pub use platform::{DATA_DIR_ENV, data_root, registry_root, settings_path};
pub use resolver::{DataRootSource, ResolvedPaths};
pub use slots::{LOCK_FILE_NAME, SLOT_FILE_NAME, SlotLocation, WELL_KNOWN_SLOTS};

//! Registry slot path resolution.
//!
//! A small fixed set of first-class daemons get stable, predictable
//! directories; any other name falls back to `daemons/<name>`.

use std::path::{Path, PathBuf};

use super::error::PathError;

/// File holding the JSON-encoded slot.
pub const SLOT_FILE_NAME: &str = "slot.json";

/// Lock file co-located with the slot file. Its content is irrelevant.
pub const LOCK_FILE_NAME: &str = "slot.lock";

/// Well-known slot names and their directories relative to the registry root.
pub const WELL_KNOWN_SLOTS: &[(&str, &str)] = &[
    ("proxy", "proxy"),
    ("tunnel", "tunnels/default"),
    ("opencode", "opencode"),
];

/// Resolved on-disk location of a named slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLocation {
    /// The slot name as given by the caller.
    pub name: String,
    /// Directory containing the slot and lock files.
    pub dir: PathBuf,
    /// Path to `slot.json`.
    pub slot_file: PathBuf,
    /// Path to `slot.lock`.
    pub lock_file: PathBuf,
}

impl SlotLocation {
    /// Resolve the location of `name` under `root`.
    pub fn resolve(root: &Path, name: &str) -> Result<Self, PathError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PathError::EmptySlotName);
        }

        let dir = WELL_KNOWN_SLOTS
            .iter()
            .find(|(known, _)| *known == trimmed)
            .map_or_else(
                || root.join("daemons").join(sanitize(trimmed)),
                |(_, relative)| root.join(relative),
            );

        Ok(Self {
            name: trimmed.to_string(),
            slot_file: dir.join(SLOT_FILE_NAME),
            lock_file: dir.join(LOCK_FILE_NAME),
            dir,
        })
    }

    /// Whether `name` is one of the first-class slots.
    pub fn is_well_known(name: &str) -> bool {
        WELL_KNOWN_SLOTS.iter().any(|(known, _)| *known == name.trim())
    }
}

/// Keep names usable as a single path component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

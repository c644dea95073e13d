//! Paths command handler.
//!
//! Displays all resolved paths for diagnostics.

use anyhow::Result;
use devhub_core::ResolvedPaths;

/// Print the resolved paths in `key = value` format.
pub fn execute(paths: &ResolvedPaths) -> Result<()> {
    println!("{paths}");
    Ok(())
}

//! Platform-specific data root resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "DEVHUB_DATA_DIR";

/// Get the root directory for application data (registry, settings).
///
/// Resolution order:
/// 1. `DEVHUB_DATA_DIR` environment variable (highest priority)
/// 2. System data directory (e.g., `~/.local/share/devhub`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    let root = data_dir.join("devhub");

    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(root)
}

/// Directory holding one subdirectory per registry slot.
///
/// Location: `<data_root>/registry/`
pub fn registry_root() -> Result<PathBuf, PathError> {
    Ok(super::ResolvedPaths::resolve()?.registry_root)
}

/// Location of the optional settings file: `<data_root>/settings.json`.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(super::ResolvedPaths::resolve()?.settings_file)
}

#[cfg(test)]
mod tests {
    use super::super::ResolvedPaths;
    use tempfile::TempDir;

    #[test]
    fn registry_root_is_under_data_root() {
        let tmp = TempDir::new().unwrap();
        let paths = ResolvedPaths::resolve_with_data_dir(Some(tmp.path())).unwrap();
        assert!(paths.registry_root.starts_with(tmp.path()));
        assert!(paths.registry_root.ends_with("registry"));
    }

    #[test]
    fn settings_path_is_json_file() {
        let tmp = TempDir::new().unwrap();
        let paths = ResolvedPaths::resolve_with_data_dir(Some(tmp.path())).unwrap();
        assert_eq!(paths.settings_file.parent(), Some(tmp.path()));
        assert_eq!(
            paths.settings_file.file_name().and_then(|s| s.to_str()),
            Some("settings.json")
        );
    }
}

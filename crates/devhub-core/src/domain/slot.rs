//! Persisted identity of a rediscoverable daemon.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One named slot as stored in `slot.json`.
///
/// Liveness of `pid` is advisory: readers check it themselves and PIDs can
/// be reused after long idle periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySlot {
    pub name: String,
    pub pid: u32,
    pub port: u16,
    /// Unix timestamp (seconds) when the daemon was started.
    pub start_time: u64,
    /// Override of where the daemon's working files live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_path: Option<PathBuf>,
}

impl RegistrySlot {
    /// Create a slot stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, pid: u32, port: u16) -> Self {
        Self {
            name: name.into(),
            pid,
            port,
            start_time: unix_now(),
            custom_path: None,
        }
    }

    /// Set the custom working path.
    #[must_use]
    pub fn with_custom_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_path = Some(path.into());
        self
    }

    /// Working directory for the daemon, preferring `custom_path`.
    pub fn work_dir<'a>(&'a self, default: &'a Path) -> &'a Path {
        self.custom_path.as_deref().unwrap_or(default)
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_path_is_omitted_when_absent() {
        let slot = RegistrySlot {
            name: "proxy".to_string(),
            pid: 4242,
            port: 8080,
            start_time: 1_700_000_000,
            custom_path: None,
        };
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(
            json,
            r#"{"name":"proxy","pid":4242,"port":8080,"start_time":1700000000}"#
        );
    }

    #[test]
    fn parses_file_written_by_other_tools() {
        let json = r#"{"name":"tunnel","pid":17,"port":0,"start_time":5,"custom_path":"/srv/tunnel"}"#;
        let slot: RegistrySlot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.custom_path, Some(PathBuf::from("/srv/tunnel")));
        assert_eq!(slot.work_dir(Path::new("/default")), Path::new("/srv/tunnel"));
    }

    #[test]
    fn work_dir_falls_back_to_default() {
        let slot = RegistrySlot::new("proxy", 1, 2);
        assert_eq!(slot.work_dir(Path::new("/default")), Path::new("/default"));
        assert!(slot.start_time > 0);
    }
}

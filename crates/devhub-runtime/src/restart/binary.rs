//! Versioned binary discovery.
//!
//! Binaries carry their version as a `-v<N>` suffix (`devhub-v3`); a name
//! without one is version 0. An upgrade is a sibling file with the same base
//! name and a strictly higher version.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// `(base name, version)` parsed from a binary's file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryVersion {
    pub base: String,
    pub version: u32,
}

impl BinaryVersion {
    /// Parse a file name. A trailing `.exe` is ignored.
    pub fn parse(file_name: &str) -> Self {
        let stem = strip_exe(file_name);

        if let Some((base, suffix)) = stem.rsplit_once("-v") {
            if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(version) = suffix.parse() {
                    return Self {
                        base: base.to_string(),
                        version,
                    };
                }
            }
        }

        Self {
            base: stem.to_string(),
            version: 0,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(Self::parse)
    }
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

/// Highest-versioned sibling of `current` with the same base name, if any
/// is newer than `current`.
pub fn find_upgrade(current: &Path) -> io::Result<Option<PathBuf>> {
    let Some(current_version) = BinaryVersion::from_path(current) else {
        return Ok(None);
    };
    let Some(dir) = current.parent() else {
        return Ok(None);
    };

    let mut best: Option<(u32, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(candidate) = BinaryVersion::from_path(&path) else {
            continue;
        };
        if candidate.base != current_version.base || candidate.version <= current_version.version {
            continue;
        }
        if best.as_ref().is_none_or(|(v, _)| candidate.version > *v) {
            best = Some((candidate.version, path));
        }
    }

    if let Some((version, path)) = &best {
        debug!(path = %path.display(), version, current = current_version.version, "Found newer binary");
    }
    Ok(best.map(|(_, path)| path))
}

/// The binary a restart should run: the newest upgrade, or `current`.
pub fn select_binary(current: &Path) -> io::Result<PathBuf> {
    Ok(find_upgrade(current)?.unwrap_or_else(|| current.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn parses_versions() {
        assert_eq!(
            BinaryVersion::parse("devhub-v3"),
            BinaryVersion {
                base: "devhub".into(),
                version: 3
            }
        );
        assert_eq!(BinaryVersion::parse("devhub").version, 0);
        assert_eq!(BinaryVersion::parse("devhub-v12.exe").version, 12);
        assert_eq!(BinaryVersion::parse("dev-hub-v2").base, "dev-hub");
        assert_eq!(BinaryVersion::parse("devhub-vnext").base, "devhub-vnext");
        assert_eq!(BinaryVersion::parse("-v4").base, "-v4");
    }

    #[test]
    fn picks_highest_sibling() {
        let dir = TempDir::new().unwrap();
        for name in ["app", "app-v1", "app-v3", "app-v2"] {
            touch(dir.path(), name);
        }
        let current = dir.path().join("app-v1");

        assert_eq!(select_binary(&current).unwrap(), dir.path().join("app-v3"));
    }

    #[test]
    fn ignores_other_bases_and_directories() {
        let dir = TempDir::new().unwrap();
        let current = touch(dir.path(), "app");
        touch(dir.path(), "other-v9");
        fs::create_dir(dir.path().join("app-v7")).unwrap();

        assert_eq!(find_upgrade(&current).unwrap(), None);
        assert_eq!(select_binary(&current).unwrap(), current);
    }

    #[test]
    fn never_downgrades() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app-v1");
        let current = touch(dir.path(), "app-v4");

        assert_eq!(select_binary(&current).unwrap(), current);
    }
}

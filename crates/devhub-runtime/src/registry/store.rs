//! The locked slot registry.
//!
//! Every read-modify-write of a slot happens while holding that slot's
//! exclusive lock. The lock is blocking; async callers go through
//! `spawn_blocking` (see `crate::daemon`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use devhub_core::{RegistrySlot, SlotLocation, registry_root};
use tracing::{debug, warn};

use super::error::RegistryError;
use super::lock::{FileLock, NamedLock};

/// Named slots under a registry root, each guarded by its own lock.
#[derive(Debug, Clone)]
pub struct LockedRegistry<L = FileLock> {
    root: PathBuf,
    lock: L,
}

impl LockedRegistry<FileLock> {
    /// Registry rooted at `root`, using advisory file locks.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_lock_impl(root, FileLock)
    }

    /// Registry at the default data directory location.
    pub fn open_default() -> Result<Self, RegistryError> {
        Ok(Self::new(registry_root()?))
    }
}

impl<L: NamedLock> LockedRegistry<L> {
    /// Registry rooted at `root` with a custom lock primitive.
    pub fn with_lock_impl(root: impl Into<PathBuf>, lock: L) -> Self {
        Self {
            root: root.into(),
            lock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve where `name` lives on disk.
    pub fn location(&self, name: &str) -> Result<SlotLocation, RegistryError> {
        Ok(SlotLocation::resolve(&self.root, name)?)
    }

    /// Acquire the exclusive lock for `name`, blocking until available.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn lock(&self, name: &str) -> Result<SlotGuard<L::Guard>, RegistryError> {
        let location = self.location(name)?;
        let held = self.lock.acquire(&location)?;
        Ok(SlotGuard {
            location,
            _held: held,
        })
    }

    /// Run `action` while holding the lock for `name`.
    ///
    /// The lock is released on every exit path, including a panic inside
    /// `action`. Errors from `action` pass through unchanged.
    pub fn with_lock<T, E, F>(&self, name: &str, action: F) -> Result<T, E>
    where
        F: FnOnce(&SlotGuard<L::Guard>) -> Result<T, E>,
        E: From<RegistryError>,
    {
        let guard = self.lock(name)?;
        action(&guard)
    }

    /// Read the slot for `name` under its lock.
    pub fn load(&self, name: &str) -> Result<Option<RegistrySlot>, RegistryError> {
        self.with_lock(name, SlotGuard::load)
    }

    /// Write the slot for `name` under its lock.
    pub fn save(&self, name: &str, slot: &RegistrySlot) -> Result<(), RegistryError> {
        self.with_lock(name, |guard| guard.save(slot))
    }

    /// Remove the slot for `name` under its lock. Idempotent.
    pub fn clear(&self, name: &str) -> Result<(), RegistryError> {
        self.with_lock(name, SlotGuard::clear)
    }

    /// Every slot currently persisted, sorted by name.
    ///
    /// Corrupt slot files are skipped with a warning rather than failing
    /// the whole listing.
    pub fn list(&self) -> Result<Vec<RegistrySlot>, RegistryError> {
        let mut names: Vec<String> = devhub_core::paths::WELL_KNOWN_SLOTS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect();

        let daemons = self.root.join("daemons");
        match fs::read_dir(&daemons) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if !entry.path().is_dir() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    // Well-known names never resolve under daemons/.
                    if SlotLocation::is_well_known(&name) {
                        debug!(
                            dir = %entry.path().display(),
                            "Ignoring daemons/ entry named like a well-known slot"
                        );
                        continue;
                    }
                    names.push(name);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RegistryError::Io {
                    path: daemons,
                    source,
                });
            }
        }

        names.sort();
        names.dedup();

        let mut slots = Vec::new();
        for name in names {
            let location = self.location(&name)?;
            if !location.slot_file.exists() {
                continue;
            }
            match self.load(&name) {
                Ok(Some(slot)) => slots.push(slot),
                Ok(None) => {}
                Err(RegistryError::Corrupt { path, source }) => {
                    warn!(path = %path.display(), error = %source, "Skipping corrupt slot file");
                }
                Err(e) => return Err(e),
            }
        }
        slots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(slots)
    }
}

/// Proof that a slot's lock is held. Slot I/O through the guard cannot
/// race with other holders of the same name.
#[derive(Debug)]
pub struct SlotGuard<G> {
    location: SlotLocation,
    _held: G,
}

impl<G> SlotGuard<G> {
    pub fn name(&self) -> &str {
        &self.location.name
    }

    pub fn location(&self) -> &SlotLocation {
        &self.location
    }

    /// Read the slot. A missing file is `Ok(None)`, an unparseable one is
    /// `RegistryError::Corrupt`.
    pub fn load(&self) -> Result<Option<RegistrySlot>, RegistryError> {
        let path = &self.location.slot_file;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| RegistryError::Corrupt {
                path: path.clone(),
                source,
            })
    }

    /// Write the slot, replacing any existing content.
    pub fn save(&self, slot: &RegistrySlot) -> Result<(), RegistryError> {
        let path = &self.location.slot_file;
        let io_err = |source| RegistryError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.location.dir).map_err(|source| RegistryError::Io {
            path: self.location.dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(slot)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        // Write beside the target then rename, so a crash mid-write never
        // leaves a truncated slot file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(slot = %self.location.name, pid = slot.pid, port = slot.port, "Saved slot");
        Ok(())
    }

    /// Remove the slot file. Absent is success.
    pub fn clear(&self) -> Result<(), RegistryError> {
        let path = &self.location.slot_file;
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(slot = %self.location.name, "Cleared slot");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Io {
                path: path.clone(),
                source,
            }),
        }
    }
}

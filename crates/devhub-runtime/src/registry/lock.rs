//! Named exclusive locks backed by advisory file locks.
//!
//! `flock` on Unix and `LockFileEx` on Windows (both through `fs2`). The
//! lock is per open file description, so it excludes other OS processes and
//! other threads of this process alike.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use devhub_core::SlotLocation;
use fs2::FileExt;
use tracing::{debug, warn};

use super::error::RegistryError;

/// A named exclusive lock. Call sites only see acquire → guard → drop, so a
/// platform can substitute another primitive.
pub trait NamedLock: Send + Sync {
    /// Held for as long as the lock is held; releasing happens on drop.
    type Guard: Send;

    /// Block until the lock for `location` is acquired.
    fn acquire(&self, location: &SlotLocation) -> Result<Self::Guard, RegistryError>;
}

/// Advisory lock on the slot's `slot.lock` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLock;

/// Releases the file lock on drop, including during unwinding.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl NamedLock for FileLock {
    type Guard = FileLockGuard;

    fn acquire(&self, location: &SlotLocation) -> Result<FileLockGuard, RegistryError> {
        let lock_err = |source| RegistryError::Lock {
            name: location.name.clone(),
            path: location.lock_file.clone(),
            source,
        };

        fs::create_dir_all(&location.dir).map_err(lock_err)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&location.lock_file)
            .map_err(lock_err)?;

        FileExt::lock_exclusive(&file).map_err(lock_err)?;
        debug!(slot = %location.name, path = %location.lock_file.display(), "Acquired slot lock");

        Ok(FileLockGuard {
            file,
            path: location.lock_file.clone(),
        })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock too; unlocking explicitly
        // just makes the release immediate.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release slot lock");
        }
    }
}

/// Lock that always fails to acquire, as an unwritable lock directory would.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RefusingLock;

#[cfg(test)]
impl NamedLock for RefusingLock {
    type Guard = ();

    fn acquire(&self, location: &SlotLocation) -> Result<(), RegistryError> {
        Err(RegistryError::Lock {
            name: location.name.clone(),
            path: location.lock_file.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "lock refused"),
        })
    }
}

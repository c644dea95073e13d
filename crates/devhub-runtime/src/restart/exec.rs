//! In-place restart: drain, then replace the process image.
//!
//! On Unix the new binary runs under the same PID with the same argv and
//! environment. Elsewhere the new binary is spawned and this process exits,
//! so the PID changes.

use std::convert::Infallible;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::binary::select_binary;
use crate::shutdown::{ShutdownCoordinator, ShutdownMode};

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("cannot resolve current executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("failed to scan {dir} for newer binaries: {source}")]
    Discovery {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to make {path} executable: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Replacing the process image failed. The server may be half-drained.
    #[error("exec of {path} failed: {source}")]
    Exec {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn replacement {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Restarts the running server into the newest available binary.
#[derive(Debug)]
pub struct ExecRestart {
    coordinator: Arc<ShutdownCoordinator>,
    drain_timeout: Duration,
    current_exe: Option<PathBuf>,
}

impl ExecRestart {
    /// Uses the coordinator's restart drain budget.
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Self {
        let drain_timeout = coordinator.config().restart_drain;
        Self {
            coordinator,
            drain_timeout,
            current_exe: None,
        }
    }

    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Treat `path` as the running executable when looking for upgrades.
    #[must_use]
    pub fn with_current_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_exe = Some(path.into());
        self
    }

    /// Whether a restart keeps the PID.
    pub const fn supports_in_place_restart() -> bool {
        cfg!(unix)
    }

    /// The binary `restart` would run.
    pub fn target_binary(&self) -> Result<PathBuf, RestartError> {
        let current = match &self.current_exe {
            Some(path) => path.clone(),
            None => current_exe()?,
        };
        select_binary(&current).map_err(|source| RestartError::Discovery {
            dir: current.parent().map(Path::to_path_buf).unwrap_or_default(),
            source,
        })
    }

    /// Drain and restart into the newest binary. Only returns on failure.
    pub async fn restart(&self) -> Result<Infallible, RestartError> {
        let binary = self.target_binary()?;
        self.restart_into(binary).await
    }

    /// Drain and restart into `binary`. Only returns on failure.
    ///
    /// The drain is bounded by the restart budget and the restart proceeds
    /// whether or not it finished in time.
    pub async fn restart_into(&self, binary: PathBuf) -> Result<Infallible, RestartError> {
        ensure_executable(&binary)?;

        self.coordinator.set_mode(ShutdownMode::Restart);
        info!(binary = %binary.display(), in_place = Self::supports_in_place_restart(), "Restarting");

        match self.coordinator.drain(self.drain_timeout).await {
            Ok(()) => info!("Drain finished; replacing process"),
            Err(e) => warn!(error = %e, "Drain incomplete; restarting anyway"),
        }

        let err = replace_process(&binary);
        error!(
            binary = %binary.display(),
            error = %err,
            "CRITICAL: restart failed after drain; server needs manual intervention"
        );
        Err(err)
    }
}

fn current_exe() -> Result<PathBuf, RestartError> {
    let path = std::env::current_exe().map_err(RestartError::CurrentExe)?;

    // Linux reports a replaced binary as "<path> (deleted)".
    let Some(name) = path.to_str() else {
        return Ok(path);
    };
    Ok(name
        .strip_suffix(" (deleted)")
        .map_or_else(|| path.clone(), PathBuf::from))
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<(), RestartError> {
    use std::os::unix::fs::PermissionsExt;

    let perm_err = |source| RestartError::Permissions {
        path: path.to_path_buf(),
        source,
    };

    let mut perms = std::fs::metadata(path).map_err(perm_err)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 != 0o111 {
        perms.set_mode(mode | 0o111);
        std::fs::set_permissions(path, perms).map_err(perm_err)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(path: &Path) -> Result<(), RestartError> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|source| RestartError::Permissions {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace the process image. Returns only on failure.
#[cfg(unix)]
fn replace_process(binary: &Path) -> RestartError {
    use std::os::unix::process::CommandExt;

    let mut args = std::env::args_os();
    let arg0 = args
        .next()
        .unwrap_or_else(|| binary.as_os_str().to_os_string());

    let source = std::process::Command::new(binary)
        .arg0(arg0)
        .args(args)
        .exec();

    RestartError::Exec {
        path: binary.to_path_buf(),
        source,
    }
}

/// No exec here: spawn the replacement with the same arguments and exit.
#[cfg(not(unix))]
fn replace_process(binary: &Path) -> RestartError {
    match std::process::Command::new(binary)
        .args(std::env::args_os().skip(1))
        .spawn()
    {
        Ok(child) => {
            info!(pid = child.id(), "Replacement started; exiting");
            std::process::exit(0)
        }
        Err(source) => RestartError::Spawn {
            path: binary.to_path_buf(),
            source,
        },
    }
}

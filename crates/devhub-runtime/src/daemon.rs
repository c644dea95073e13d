//! Rediscoverable daemons: supervised processes whose PID and port are also
//! recorded in a registry slot.
//!
//! The slot lock is held across the whole load → liveness check → start →
//! wait for health → save sequence, so two invocations racing for the same
//! name end up with one daemon between them.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use devhub_core::{CommandSpec, HealthProbe, RegistrySlot};
use thiserror::Error;
use tracing::{info, warn};

use crate::process::{ProcessHandle, ProcessSupervisor, SupervisorError, kill_pid};
use crate::registry::{LockedRegistry, NamedLock, RegistryError, SlotGuard, pid_exists};

/// Errors from the daemon helpers.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Started, but never reported healthy; the process has been stopped.
    #[error("daemon '{name}' did not become healthy within {waited:?}")]
    Unhealthy { name: String, waited: Duration },

    /// Killing an orphaned daemon by PID failed.
    #[error("failed to kill daemon '{name}' (pid {pid}): {source}")]
    Kill {
        name: String,
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The blocking lock task panicked or was cancelled.
    #[error("slot lock task failed: {0}")]
    LockTask(String),
}

/// What to run under a named slot.
pub struct DaemonRequest {
    /// Slot name; also the supervisor id.
    pub name: String,
    pub display_name: String,
    pub command: CommandSpec,
    pub port: u16,
    pub custom_path: Option<PathBuf>,
    pub probe: Option<Arc<dyn HealthProbe>>,
    /// Budget for the new process to report healthy.
    pub ready_timeout: Duration,
}

impl DaemonRequest {
    pub fn new(name: impl Into<String>, command: CommandSpec, port: u16) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            command,
            port,
            custom_path: None,
            probe: None,
            ready_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_custom_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for DaemonRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonRequest")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("port", &self.port)
            .field("has_probe", &self.probe.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of `ensure_daemon`.
#[derive(Debug)]
pub enum DaemonOutcome {
    /// A live daemon was already recorded in the slot.
    Attached(RegistrySlot),
    /// A new daemon was started by this call and recorded.
    Started {
        handle: ProcessHandle,
        slot: RegistrySlot,
    },
}

impl DaemonOutcome {
    pub const fn slot(&self) -> &RegistrySlot {
        match self {
            Self::Attached(slot) | Self::Started { slot, .. } => slot,
        }
    }

    pub const fn was_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Attach to the daemon recorded under `request.name`, or start one.
///
/// A slot whose PID is no longer alive is treated as stale and replaced.
pub async fn ensure_daemon<L>(
    supervisor: &ProcessSupervisor,
    registry: &LockedRegistry<L>,
    request: DaemonRequest,
) -> Result<DaemonOutcome, DaemonError>
where
    L: NamedLock + Clone + 'static,
{
    let guard = lock_slot(registry, &request.name).await?;

    if let Some(existing) = guard.load()? {
        if pid_exists(existing.pid) {
            info!(
                slot = %request.name,
                pid = existing.pid,
                port = existing.port,
                "Attaching to running daemon"
            );
            return Ok(DaemonOutcome::Attached(existing));
        }
        warn!(slot = %request.name, pid = existing.pid, "Slot records a dead process; replacing");
    }

    let handle = supervisor
        .start(
            request.name.clone(),
            request.display_name.clone(),
            request.command,
            request.probe,
        )
        .await?;

    if !handle.wait_for_running(request.ready_timeout).await {
        warn!(slot = %request.name, "Daemon failed its readiness check; stopping it");
        if let Err(e) = supervisor.stop(&request.name).await {
            warn!(slot = %request.name, error = %e, "Stopping unhealthy daemon failed");
        }
        return Err(DaemonError::Unhealthy {
            name: request.name,
            waited: request.ready_timeout,
        });
    }

    let Some(pid) = handle.pid() else {
        return Err(DaemonError::Unhealthy {
            name: request.name,
            waited: request.ready_timeout,
        });
    };

    let mut slot = RegistrySlot::new(request.name.clone(), pid, request.port);
    slot.custom_path = request.custom_path;
    guard.save(&slot)?;

    info!(slot = %request.name, pid, port = request.port, "Daemon started and recorded");
    Ok(DaemonOutcome::Started { handle, slot })
}

/// Stop the daemon recorded under `name` and clear its slot.
///
/// Uses the supervisor if this instance owns the process, otherwise kills
/// the recorded PID with SIGTERM → SIGKILL after `grace`. Returns the slot
/// that was cleared, or `None` if there was nothing recorded.
pub async fn teardown_daemon<L>(
    supervisor: &ProcessSupervisor,
    registry: &LockedRegistry<L>,
    name: &str,
    grace: Duration,
) -> Result<Option<RegistrySlot>, DaemonError>
where
    L: NamedLock + Clone + 'static,
{
    let guard = lock_slot(registry, name).await?;

    let Some(slot) = guard.load()? else {
        return Ok(None);
    };

    let owned = supervisor
        .handle(name)
        .await
        .filter(|h| h.pid() == Some(slot.pid) && h.status().is_live());

    if owned.is_some() {
        match supervisor.stop(name).await {
            Ok(()) | Err(SupervisorError::NotRunning { .. }) => {}
            Err(SupervisorError::StopTimeout { waited, .. }) => {
                warn!(slot = %name, ?waited, "Daemon still stopping; clearing slot anyway");
            }
            Err(e) => return Err(e.into()),
        }
    } else if pid_exists(slot.pid) {
        kill_pid(slot.pid, grace)
            .await
            .map_err(|source| DaemonError::Kill {
                name: name.to_string(),
                pid: slot.pid,
                source,
            })?;
    }

    guard.clear()?;
    info!(slot = %name, pid = slot.pid, "Daemon torn down");
    Ok(Some(slot))
}

async fn lock_slot<L>(
    registry: &LockedRegistry<L>,
    name: &str,
) -> Result<SlotGuard<L::Guard>, DaemonError>
where
    L: NamedLock + Clone + 'static,
{
    let registry = registry.clone();
    let name = name.to_string();
    tokio::task::spawn_blocking(move || registry.lock(&name))
        .await
        .map_err(|e| DaemonError::LockTask(e.to_string()))?
        .map_err(DaemonError::from)
}

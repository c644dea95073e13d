//! In-memory supervisor for child processes spawned by this server instance.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use devhub_core::{CommandSpec, HealthProbe, ProcessSnapshot, ProcessStatus, Settings};
use futures_util::future::join_all;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::SupervisorError;
use super::managed::{ManagedProcess, ProcessHandle, Readiness};
use super::monitor::monitor;
use super::stream::spawn_stream_reader;

/// Timing knobs for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Time between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    /// How long `stop` (and each `stop_all` member) blocks its caller.
    pub stop_wait: Duration,
    /// Health probe polling interval in `wait_for_running`.
    pub health_poll: Duration,
    /// Delay before optimistically reporting a probe-less process as up.
    pub optimistic_start: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&Settings::with_defaults())
    }
}

impl From<&Settings> for SupervisorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            stop_grace: settings.stop_grace(),
            stop_wait: settings.stop_wait(),
            health_poll: settings.health_poll(),
            optimistic_start: settings.optimistic_start(),
        }
    }
}

/// Supervisor for long-running child processes.
///
/// Constructed once at process start and passed (behind an `Arc`) to every
/// component that starts or queries processes. Each child runs in its own
/// process group and has a monitor task that drives its state machine.
///
/// # Example
///
/// ```ignore
/// let supervisor = ProcessSupervisor::new(SupervisorConfig::default());
/// let handle = supervisor.start("proxy", "Shared proxy", spec, Some(probe)).await?;
/// handle.wait_for_running(Duration::from_secs(10)).await;
/// supervisor.stop("proxy").await?;
/// ```
pub struct ProcessSupervisor {
    processes: RwLock<HashMap<String, Arc<ManagedProcess>>>,
    shutdown: CancellationToken,
    config: SupervisorConfig,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl ProcessSupervisor {
    /// Create a supervisor with its own cancellation token.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_shutdown_token(config, CancellationToken::new())
    }

    /// Create a supervisor whose monitors also stop when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown_token(config: SupervisorConfig, shutdown: CancellationToken) -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
            shutdown,
            config,
        }
    }

    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start a child process under `id`.
    ///
    /// Fails with `AlreadyRunning` if `id` maps to a live process, leaving
    /// that process untouched. A terminal entry under the same id is replaced
    /// by a fresh `ManagedProcess`. On spawn failure the entry stays
    /// registered in state Error with `last_error` set.
    pub async fn start(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        spec: CommandSpec,
        probe: Option<Arc<dyn HealthProbe>>,
    ) -> Result<ProcessHandle, SupervisorError> {
        let id = id.into();
        let readiness = Readiness {
            poll_interval: self.config.health_poll,
            optimistic_delay: self.config.optimistic_start,
        };
        let process = Arc::new(ManagedProcess::new(
            id.clone(),
            name.into(),
            spec,
            probe,
            readiness,
        ));

        // Claim the id while holding the write lock. The entry is live from
        // here on, so a concurrent start is rejected without the table
        // staying locked across fork/exec.
        {
            let mut table = self.processes.write().await;
            if let Some(existing) = table.get(&id) {
                if existing.status().is_live() {
                    return Err(SupervisorError::AlreadyRunning { id });
                }
            }
            process.transition(ProcessStatus::Starting);
            table.insert(id.clone(), Arc::clone(&process));
        }

        let mut child = match build_command(process.spec()).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(id = %id, command = %process.spec().display_line(), error = %e, "Failed to spawn process");
                process.finish(ProcessStatus::Error, None, Some(e.to_string()));
                return Err(SupervisorError::Start { id, source: e });
            }
        };
        process.mark_running(child.id());

        let log_id: Arc<str> = Arc::from(id.as_str());
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, Arc::clone(&log_id), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, log_id, "stderr");
        }

        tokio::spawn(monitor(
            Arc::clone(&process),
            child,
            self.shutdown.clone(),
            self.config.stop_grace,
        ));

        info!(
            id = %id,
            name = %process.name(),
            pid = ?process.pid(),
            command = %process.spec().display_line(),
            "Process started"
        );
        Ok(ProcessHandle::new(process))
    }

    /// Stop a process, blocking up to `stop_wait` for it to finish.
    ///
    /// On `StopTimeout` the stop still proceeds in the background.
    pub async fn stop(&self, id: &str) -> Result<(), SupervisorError> {
        let process = self.get(id).await.ok_or_else(|| SupervisorError::NotFound {
            id: id.to_string(),
        })?;

        if process.status().is_terminal() {
            return Err(SupervisorError::NotRunning { id: id.to_string() });
        }

        process.request_stop();
        let waited = self.config.stop_wait;
        timeout(waited, process.wait_terminal())
            .await
            .map_err(|_| SupervisorError::StopTimeout {
                id: id.to_string(),
                waited,
            })
    }

    /// Stop every live process concurrently. Never fails.
    ///
    /// Each process gets its own `stop_wait` budget; one that has not
    /// finished by then is SIGKILLed directly by this call. Total time is
    /// bounded by a single budget regardless of how many processes run.
    pub async fn stop_all(&self) {
        let live: Vec<Arc<ManagedProcess>> = {
            let table = self.processes.read().await;
            table
                .values()
                .filter(|p| p.status().is_live())
                .cloned()
                .collect()
        };

        if live.is_empty() {
            debug!("stop_all: nothing to stop");
            return;
        }

        info!(count = live.len(), "Stopping all supervised processes");
        let wait = self.config.stop_wait;

        join_all(live.into_iter().map(|process| async move {
            process.request_stop();
            if timeout(wait, process.wait_terminal()).await.is_err() {
                warn!(id = %process.id(), "Process did not stop within budget; force-killing group");
                process.force_kill_group();
            }
        }))
        .await;

        info!("All supervised processes stopped");
    }

    /// Fire the supervisor-wide cancellation: every monitor escalates.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn status(&self, id: &str) -> Option<ProcessSnapshot> {
        self.get(id).await.map(|p| p.snapshot())
    }

    /// Snapshots of every registered process, sorted by id.
    pub async fn list(&self) -> Vec<ProcessSnapshot> {
        let table = self.processes.read().await;
        let mut snapshots: Vec<ProcessSnapshot> = table.values().map(|p| p.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.get(id)
            .await
            .is_some_and(|p| p.status() == ProcessStatus::Running)
    }

    /// Handle to a registered process.
    pub async fn handle(&self, id: &str) -> Option<ProcessHandle> {
        self.get(id).await.map(ProcessHandle::new)
    }

    /// Handles of every process currently in state Running.
    pub async fn running(&self) -> Vec<ProcessHandle> {
        let table = self.processes.read().await;
        table
            .values()
            .filter(|p| p.status() == ProcessStatus::Running)
            .cloned()
            .map(ProcessHandle::new)
            .collect()
    }

    /// Remove terminal entries from the table, returning their ids.
    pub async fn cleanup(&self) -> Vec<String> {
        let mut table = self.processes.write().await;
        let dead: Vec<String> = table
            .iter()
            .filter(|(_, p)| p.status().is_terminal())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &dead {
            table.remove(id);
        }

        debug!(removed = dead.len(), remaining = table.len(), "cleanup finished");
        dead
    }

    /// Remove one terminal entry. Live entries are left alone.
    pub async fn remove(&self, id: &str) -> Result<(), SupervisorError> {
        let mut table = self.processes.write().await;
        match table.get(id) {
            None => Err(SupervisorError::NotFound { id: id.to_string() }),
            Some(p) if p.status().is_live() => Err(SupervisorError::AlreadyRunning {
                id: id.to_string(),
            }),
            Some(_) => {
                table.remove(id);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Option<Arc<ManagedProcess>> {
        self.processes.read().await.get(id).cloned()
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    // Own process group: terminal signals aimed at the supervisor never
    // reach the child, and the group id equals the child's PID.
    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    cmd
}

//! One supervised child process and the handle callers hold on to it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use devhub_core::{CommandSpec, HealthProbe, ProcessSnapshot, ProcessStatus};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::shutdown::{GroupSignal, signal_group};

/// Exit code recorded for a process that was force-killed or died by signal.
pub const FORCE_KILLED_EXIT_CODE: i32 = -1;

/// How `wait_for_running` decides a process is up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Readiness {
    pub poll_interval: Duration,
    pub optimistic_delay: Duration,
}

#[derive(Debug)]
struct ProcessState {
    status: ProcessStatus,
    pid: Option<u32>,
    pgid: Option<u32>,
    start_time: DateTime<Utc>,
    stop_time: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    last_error: Option<String>,
    healthy: Option<bool>,
}

/// A child process owned by the supervisor that created it.
///
/// After `start` returns, only the owning monitor task writes the lifecycle
/// fields; readers take short snapshots under the state mutex.
pub struct ManagedProcess {
    id: String,
    name: String,
    spec: CommandSpec,
    probe: Option<Arc<dyn HealthProbe>>,
    readiness: Readiness,
    state: Mutex<ProcessState>,
    status_tx: watch::Sender<ProcessStatus>,
    stop: CancellationToken,
}

impl ManagedProcess {
    pub(crate) fn new(
        id: String,
        name: String,
        spec: CommandSpec,
        probe: Option<Arc<dyn HealthProbe>>,
        readiness: Readiness,
    ) -> Self {
        let (status_tx, _) = watch::channel(ProcessStatus::Pending);
        Self {
            id,
            name,
            spec,
            probe,
            readiness,
            state: Mutex::new(ProcessState {
                status: ProcessStatus::Pending,
                pid: None,
                pgid: None,
                start_time: Utc::now(),
                stop_time: None,
                exit_code: None,
                last_error: None,
                healthy: None,
            }),
            status_tx,
            stop: CancellationToken::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn status(&self) -> ProcessStatus {
        self.state().status
    }

    pub fn pid(&self) -> Option<u32> {
        self.state().pid
    }

    pub fn pgid(&self) -> Option<u32> {
        self.state().pgid
    }

    pub(crate) fn probe(&self) -> Option<&Arc<dyn HealthProbe>> {
        self.probe.as_ref()
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        let state = self.state();
        ProcessSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            status: state.status,
            pid: state.pid,
            pgid: state.pgid,
            command: self.spec.display_line(),
            start_time: state.start_time,
            stop_time: state.stop_time,
            exit_code: state.exit_code,
            last_error: state.last_error.clone(),
            healthy: state.healthy,
        }
    }

    /// Move along a non-terminal edge of the state machine.
    pub(crate) fn transition(&self, next: ProcessStatus) -> bool {
        debug_assert!(!next.is_terminal(), "use finish() for terminal states");
        let mut state = self.state();
        if !state.status.can_transition_to(next) {
            warn!(id = %self.id, from = %state.status, to = %next, "Ignoring illegal state transition");
            return false;
        }
        state.status = next;
        drop(state);
        self.status_tx.send_replace(next);
        true
    }

    /// Record a successful spawn. The child leads its own process group.
    pub(crate) fn mark_running(&self, pid: Option<u32>) {
        {
            let mut state = self.state();
            state.pid = pid;
            state.pgid = if cfg!(unix) { pid } else { None };
            state.start_time = Utc::now();
        }
        self.transition(ProcessStatus::Running);
    }

    /// Drive the single terminal transition. Later calls are ignored, so
    /// `exit_code` and `stop_time` are written exactly once.
    pub(crate) fn finish(&self, status: ProcessStatus, exit_code: Option<i32>, error: Option<String>) {
        debug_assert!(status.is_terminal());
        let mut state = self.state();
        if state.status.is_terminal() {
            debug!(id = %self.id, current = %state.status, "Process already terminal");
            return;
        }
        if !state.status.can_transition_to(status) {
            warn!(id = %self.id, from = %state.status, to = %status, "Forcing terminal transition");
        }
        state.status = status;
        state.stop_time = Some(Utc::now());
        state.exit_code = exit_code;
        if error.is_some() {
            state.last_error = error;
        }
        drop(state);
        self.status_tx.send_replace(status);
    }

    /// Store the latest probe result, returning the previous one.
    pub(crate) fn record_health(&self, up: bool) -> Option<bool> {
        self.state().healthy.replace(up)
    }

    /// Ask the monitor task to run the stop escalation.
    pub(crate) fn request_stop(&self) {
        self.stop.cancel();
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Resolve once the process reaches Stopped or Error.
    pub(crate) async fn wait_terminal(&self) {
        let mut rx = self.status_tx.subscribe();
        // The sender lives as long as `self`, so this only errors if the
        // process is being torn down, which is terminal anyway.
        let _ = rx.wait_for(|status| status.is_terminal()).await;
    }

    /// Last-resort SIGKILL to the whole group, bypassing the monitor.
    pub(crate) fn force_kill_group(&self) {
        let Some(pgid) = self.pgid() else {
            return;
        };
        match signal_group(pgid, GroupSignal::Kill) {
            Ok(delivered) => debug!(id = %self.id, pgid, delivered, "Sent SIGKILL to process group"),
            Err(e) => warn!(id = %self.id, pgid, error = %e, "Failed to SIGKILL process group"),
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

/// Caller-facing handle to a supervised process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<ManagedProcess>,
}

impl ProcessHandle {
    pub(crate) const fn new(inner: Arc<ManagedProcess>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn status(&self) -> ProcessStatus {
        self.inner.status()
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    /// Process group owned by this process.
    pub fn pgid(&self) -> Option<u32> {
        self.inner.pgid()
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        self.inner.snapshot()
    }

    /// Wait until the process is actually serving.
    ///
    /// With a health probe, polls it at a fixed interval until it reports up
    /// or `timeout` elapses. Each poll is itself cut off at the deadline. Without one, sleeps a short fixed delay and
    /// reports success optimistically. Either way a process that already
    /// reached a terminal state is reported as not running.
    pub async fn wait_for_running(&self, timeout: Duration) -> bool {
        let readiness = self.inner.readiness;

        let Some(probe) = self.inner.probe() else {
            sleep(readiness.optimistic_delay.min(timeout)).await;
            return !self.status().is_terminal();
        };

        let deadline = Instant::now() + timeout;
        loop {
            if self.status().is_terminal() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            // A check that outlives the deadline counts as down.
            if tokio::time::timeout(left, probe.is_up()).await.unwrap_or(false) {
                self.inner.record_health(true);
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                self.inner.record_health(false);
                return false;
            }
            sleep(readiness.poll_interval.min(deadline - now)).await;
        }
    }

    /// Block until the process reaches a terminal state.
    pub async fn wait_for_exit(&self) -> ProcessSnapshot {
        self.inner.wait_terminal().await;
        self.inner.snapshot()
    }

    pub(crate) fn inner(&self) -> &Arc<ManagedProcess> {
        &self.inner
    }
}

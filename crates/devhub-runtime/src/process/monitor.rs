//! Per-process monitor task.
//!
//! Exactly one of three causes ends the monitor: the child exits on its own,
//! a stop is requested for this process, or the supervisor is cancelled.
//! Whichever fires first drives the single terminal transition.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use devhub_core::ProcessStatus;
use tokio::process::Child;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::managed::{FORCE_KILLED_EXIT_CODE, ManagedProcess};
use super::shutdown::{GroupSignal, signal_group};

#[derive(Debug, Clone, Copy)]
enum StopCause {
    Requested,
    Shutdown,
}

pub(super) async fn monitor(
    process: Arc<ManagedProcess>,
    mut child: Child,
    shutdown: CancellationToken,
    grace: Duration,
) {
    let cause = tokio::select! {
        result = child.wait() => {
            record_natural_exit(&process, result);
            return;
        }
        () = process.stop_token().cancelled() => StopCause::Requested,
        () = shutdown.cancelled() => StopCause::Shutdown,
    };

    escalate(&process, &mut child, grace, cause).await;
}

fn record_natural_exit(process: &ManagedProcess, result: io::Result<ExitStatus>) {
    match result {
        Ok(status) if status.success() => {
            info!(id = %process.id(), "Process exited cleanly");
            process.finish(ProcessStatus::Stopped, Some(0), None);
        }
        Ok(status) => {
            let code = exit_code_of(status);
            warn!(id = %process.id(), code, %status, "Process exited with failure");
            process.finish(
                ProcessStatus::Error,
                Some(code),
                Some(format!("process exited with {status}")),
            );
        }
        Err(e) => {
            error!(id = %process.id(), error = %e, "Failed to wait on process");
            process.finish(
                ProcessStatus::Error,
                Some(FORCE_KILLED_EXIT_CODE),
                Some(format!("wait failed: {e}")),
            );
        }
    }
}

/// SIGTERM the group, give it `grace` to exit, then SIGKILL and reap.
async fn escalate(process: &ManagedProcess, child: &mut Child, grace: Duration, cause: StopCause) {
    process.transition(ProcessStatus::Stopping);
    let pgid = process.pgid();
    info!(id = %process.id(), pid = ?process.pid(), ?cause, "Stopping process");

    if let Some(pgid) = pgid {
        if let Err(e) = signal_group(pgid, GroupSignal::Terminate) {
            warn!(id = %process.id(), pgid, error = %e, "Failed to SIGTERM process group");
        }
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            let code = exit_code_of(status);
            debug!(id = %process.id(), code, "Process exited within grace window");
            process.finish(ProcessStatus::Stopped, Some(code), None);
            return;
        }
        Ok(Err(e)) => {
            warn!(id = %process.id(), error = %e, "Wait failed during stop; escalating");
        }
        Err(_) => {
            warn!(id = %process.id(), grace = ?grace, "Process ignored SIGTERM; escalating to SIGKILL");
        }
    }

    force_kill(process, child, pgid).await;
    process.finish(ProcessStatus::Stopped, Some(FORCE_KILLED_EXIT_CODE), None);
}

async fn force_kill(process: &ManagedProcess, child: &mut Child, pgid: Option<u32>) {
    let delivered = pgid.is_some_and(|pgid| match signal_group(pgid, GroupSignal::Kill) {
        Ok(delivered) => delivered,
        Err(e) => {
            warn!(id = %process.id(), pgid, error = %e, "Failed to SIGKILL process group");
            false
        }
    });

    if !delivered {
        if let Err(e) = child.start_kill() {
            debug!(id = %process.id(), error = %e, "Direct kill failed (process likely gone)");
        }
    }

    // Reap so the child never lingers as a zombie.
    if let Err(e) = child.wait().await {
        warn!(id = %process.id(), error = %e, "Failed to reap killed process");
    }
}

/// Exit code, or `-1` when the process died by signal.
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FORCE_KILLED_EXIT_CODE)
}

//! Kill a daemon by PID without reaping (no `Child` handle available).
//!
//! Used when tearing down a daemon that a previous server instance started
//! and recorded in the registry.

use std::io;
use std::time::Duration;

#[cfg(unix)]
use tokio::time::sleep;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

#[cfg(unix)]
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Kill a process by PID with SIGTERM → SIGKILL escalation.
///
/// # Strategy
/// 1. Send SIGTERM
/// 2. Poll for up to `grace` for the process to disappear
/// 3. If still alive, send SIGKILL and poll for up to `grace` again
///
/// Caller must verify the PID is the expected daemon first; PIDs can be
/// reused. Returns `Ok(())` if the process was killed or already gone.
pub async fn kill_pid(pid: u32, grace: Duration) -> io::Result<()> {
    #[cfg(unix)]
    {
        kill_pid_unix(pid, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = (pid, grace);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "killing by PID is not implemented on this platform",
        ))
    }
}

#[cfg(unix)]
async fn kill_pid_unix(pid: u32, grace: Duration) -> io::Result<()> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let nix_pid = Pid::from_raw(raw);

    // Phase 1: SIGTERM
    match signal::kill(nix_pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(io::Error::other(e)),
    }
    if wait_gone(nix_pid, grace).await {
        return Ok(());
    }

    // Phase 2: SIGKILL
    match signal::kill(nix_pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(io::Error::other(e)),
    }
    if wait_gone(nix_pid, grace).await {
        return Ok(());
    }

    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process {pid} did not exit after SIGKILL"),
    ))
}

#[cfg(unix)]
async fn wait_gone(pid: Pid, budget: Duration) -> bool {
    let attempts = (budget.as_millis() / POLL_INTERVAL.as_millis()).max(1);
    for _ in 0..attempts {
        sleep(POLL_INTERVAL).await;
        if let Err(Errno::ESRCH) = signal::kill(pid, None) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(unix)]
    async fn kill_pid_handles_already_gone() {
        let result = kill_pid(999_999, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn kill_pid_terminates_process() {
        use tokio::process::Command;

        let mut child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("no PID");

        // Reap concurrently so the exited child does not linger as a zombie
        // while kill_pid polls for it.
        let (killed, status) = tokio::join!(kill_pid(pid, Duration::from_secs(2)), child.wait());

        assert!(killed.is_ok(), "kill_pid failed: {killed:?}");
        assert!(!status.expect("wait failed").success());
        assert!(!crate::registry::pid_exists(pid));
    }
}

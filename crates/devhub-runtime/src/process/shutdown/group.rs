//! Process-group signalling.
//!
//! Supervised children run in their own process group, so a signal sent to
//! the group reaches the child and everything it spawned, while Ctrl-C in
//! the supervisor's terminal reaches none of them.

use std::io;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// Signals the supervisor sends to a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSignal {
    /// Graceful termination request (SIGTERM).
    Terminate,
    /// Forced termination (SIGKILL).
    Kill,
}

/// Send `signal` to every member of process group `pgid`.
///
/// Returns `Ok(false)` when the group no longer exists, or when the platform
/// has no group signalling (the caller then falls back to the child handle).
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: GroupSignal) -> io::Result<bool> {
    let raw = i32::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    if raw <= 1 {
        // Never signal init's group or "every process we can reach".
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal process group {raw}"),
        ));
    }

    let sig = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };

    match killpg(Pid::from_raw(raw), sig) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(not(unix))]
pub fn signal_group(_pgid: u32, _signal: GroupSignal) -> io::Result<bool> {
    Ok(false)
}

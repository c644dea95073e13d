//! PID liveness checks for registry slots.
//!
//! Liveness is advisory: a PID recorded long ago may have been reused by an
//! unrelated process.

/// Check if a PID exists (without verifying it's our process).
///
/// Uses `kill` with the null signal, which checks existence without
/// delivering anything.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true, // Process exists but we lack permission
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false // Not implemented on non-Unix
}

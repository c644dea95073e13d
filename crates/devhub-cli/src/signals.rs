//! OS signal handling for long-running commands.
//!
//! On Unix SIGINT, SIGTERM and Ctrl-C request a terminal shutdown and
//! SIGHUP requests an in-place restart. Elsewhere only Ctrl-C is handled.

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Terminate,
    Restart,
}

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let received = tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownSignal::Terminate,
        _ = sigint.recv() => ShutdownSignal::Terminate,
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sighup.recv() => ShutdownSignal::Restart,
    };
    Ok(received)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Terminate)
}

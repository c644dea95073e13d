//! Serve command handler.
//!
//! Runs the status listener and the health watch until a signal arrives,
//! then drains. SIGHUP restarts in place after the drain.

use std::sync::Arc;

use anyhow::{Context, Result};
use devhub_core::DrainPhase;
use devhub_runtime::{ExecRestart, HealthWatch, HttpListenerStep};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::server;
use crate::signals::{ShutdownSignal, wait_for_shutdown_signal};

pub async fn execute(ctx: &CliContext, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or_else(|| ctx.settings.effective_http_port());
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind status listener on port {port}"))?;

    let cancel = CancellationToken::new();
    let server_task = tokio::spawn(server::serve(
        listener,
        Arc::clone(&ctx.supervisor),
        Arc::clone(&ctx.coordinator),
        cancel.clone(),
    ));

    let watch = HealthWatch::spawn(
        Arc::clone(&ctx.supervisor),
        ctx.settings.health_watch_interval(),
    );
    ctx.coordinator.register(DrainPhase::HealthChecks, Arc::new(watch));
    ctx.coordinator.register(
        DrainPhase::HttpListener,
        Arc::new(HttpListenerStep::new(cancel, server_task)),
    );

    info!(pid = std::process::id(), port, "devhub serving");

    match wait_for_shutdown_signal().await? {
        ShutdownSignal::Terminate => {
            info!("Shutdown requested");
            if let Err(e) = ctx.coordinator.terminate().await {
                warn!(error = %e, "Shutdown finished with problems");
            }
            Ok(())
        }
        ShutdownSignal::Restart => {
            info!("Restart requested");
            let restart = ExecRestart::new(Arc::clone(&ctx.coordinator));
            match restart.restart().await {
                Ok(never) => match never {},
                // Already logged as critical; exit non-zero for manual recovery.
                Err(e) => Err(e).context("in-place restart failed"),
            }
        }
    }
}

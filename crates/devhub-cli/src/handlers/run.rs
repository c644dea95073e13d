//! Run command handler.
//!
//! Ensures a named daemon is running. If this invocation started it, the
//! daemon is supervised until it exits or Ctrl-C, then torn down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use devhub_core::{CommandSpec, HealthProbe, ProcessStatus};
use devhub_runtime::{DaemonOutcome, DaemonRequest, HttpHealthProbe, ensure_daemon, teardown_daemon};
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::commands::RunArgs;
use crate::signals::wait_for_shutdown_signal;

/// Build the daemon request described by `args`.
pub fn build_request(args: &RunArgs) -> Result<DaemonRequest> {
    let Some((program, rest)) = args.command.split_first() else {
        bail!("no command given for '{}'", args.name);
    };

    let mut spec = CommandSpec::new(program).args(rest.iter().cloned());
    if let Some(cwd) = &args.cwd {
        spec = spec.current_dir(cwd);
    }

    let mut request = DaemonRequest::new(&args.name, spec, args.port)
        .with_ready_timeout(Duration::from_secs(args.ready_timeout));

    if let Some(url) = &args.health_url {
        let probe: Arc<dyn HealthProbe> = Arc::new(
            HttpHealthProbe::new(url.clone()).context("failed to build health probe client")?,
        );
        request = request.with_probe(probe);
    }
    if let Some(cwd) = &args.cwd {
        request = request.with_custom_path(cwd);
    }

    Ok(request)
}

pub async fn execute(ctx: &CliContext, args: RunArgs) -> Result<()> {
    let request = build_request(&args)?;

    match ensure_daemon(&ctx.supervisor, &ctx.registry, request).await? {
        DaemonOutcome::Attached(slot) => {
            println!(
                "{} is already running (pid {}, port {})",
                slot.name, slot.pid, slot.port
            );
            Ok(())
        }
        DaemonOutcome::Started { handle, slot } => {
            println!("Started {} (pid {}, port {})", slot.name, slot.pid, slot.port);

            let exited = tokio::select! {
                snapshot = handle.wait_for_exit() => Some(snapshot),
                signal = wait_for_shutdown_signal() => {
                    signal?;
                    info!(slot = %slot.name, "Interrupted; stopping daemon");
                    None
                }
            };

            teardown_daemon(
                &ctx.supervisor,
                &ctx.registry,
                &args.name,
                ctx.settings.stop_grace(),
            )
            .await?;

            match exited {
                Some(snapshot) if snapshot.status == ProcessStatus::Error => {
                    warn!(slot = %slot.name, exit_code = ?snapshot.exit_code, "Daemon exited with an error");
                    bail!(
                        "{} exited: {}",
                        slot.name,
                        snapshot.last_error.unwrap_or_else(|| "unknown error".to_string())
                    )
                }
                _ => Ok(()),
            }
        }
    }
}

//! Background health watch over running processes.
//!
//! Periodically probes every running process that carries a health probe,
//! records the result on the process and logs only transitions. It holds
//! process handles, so it is drained before the supervisor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devhub_core::{DrainStep, DrainStepError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::supervisor::ProcessSupervisor;

pub struct HealthWatch {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthWatch {
    /// Start watching `supervisor`'s processes every `every`.
    pub fn spawn(supervisor: Arc<ProcessSupervisor>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(supervisor, every, cancel.clone()));
        Self {
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stop the loop and wait for the in-flight round to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Health watch task ended abnormally");
            }
        }
    }
}

async fn run(supervisor: Arc<ProcessSupervisor>, every: Duration, cancel: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval = ?every, "Health watch started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        for handle in supervisor.running().await {
            let Some(probe) = handle.inner().probe() else {
                continue;
            };
            let up = probe.is_up().await;
            let previous = handle.inner().record_health(up);
            if previous == Some(up) {
                continue;
            }
            if up {
                info!(id = %handle.id(), "Process is healthy");
            } else {
                warn!(id = %handle.id(), pid = ?handle.pid(), "Process failed health check");
            }
        }
    }

    debug!("Health watch stopped");
}

#[async_trait]
impl DrainStep for HealthWatch {
    fn name(&self) -> &str {
        "health-watch"
    }

    async fn drain(&self) -> Result<(), DrainStepError> {
        self.stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SupervisorConfig;
    use devhub_core::{CommandSpec, HealthProbe};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Toggle(AtomicBool);

    #[async_trait]
    impl HealthProbe for Toggle {
        async fn is_up(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn records_probe_results_and_drains() {
        let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig {
            stop_grace: Duration::from_millis(300),
            stop_wait: Duration::from_secs(2),
            health_poll: Duration::from_millis(20),
            optimistic_start: Duration::from_millis(20),
        }));
        let probe = Arc::new(Toggle(AtomicBool::new(false)));
        let handle = supervisor
            .start(
                "svc",
                "svc",
                CommandSpec::new("sleep").arg("30"),
                Some(probe.clone() as Arc<dyn HealthProbe>),
            )
            .await
            .unwrap();

        let watch = HealthWatch::spawn(Arc::clone(&supervisor), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().healthy, Some(false));

        probe.0.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().healthy, Some(true));

        watch.drain().await.unwrap();
        // Second stop is a no-op.
        watch.stop().await;
        supervisor.stop_all().await;
    }
}

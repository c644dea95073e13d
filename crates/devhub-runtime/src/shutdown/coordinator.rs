//! Bounded, ordered drain of every registered subsystem.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use devhub_core::{DrainPhase, DrainStep, DrainStepError, Settings};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error::{ShutdownError, StepFailure};

/// Why the process is draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// The process exits after draining.
    #[default]
    Terminate,
    /// The process replaces its own image after draining.
    Restart,
}

impl fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Terminate => "terminate",
            Self::Restart => "restart",
        })
    }
}

/// Drain budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Deadline for a terminal shutdown.
    pub drain_timeout: Duration,
    /// Deadline for the drain before an in-place restart.
    pub restart_drain: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&Settings::with_defaults())
    }
}

impl From<&Settings> for CoordinatorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            drain_timeout: settings.drain_timeout(),
            restart_drain: settings.restart_drain(),
        }
    }
}

#[derive(Clone)]
struct Registered {
    phase: DrainPhase,
    step: Arc<dyn DrainStep>,
}

/// Runs registered drain steps phase by phase against a deadline.
///
/// Steps are best-effort: a failing or panicking step is recorded and the
/// sequence moves on. Each step gets the time left before the deadline
/// split evenly across the steps not yet run. A step that overruns its
/// share is recorded as `TimedOut` and left running detached while the
/// next step starts, so one wedged subsystem cannot keep the others from
/// being asked to stop. `drain` reports `Timeout` if any step overran or
/// the deadline fired first.
///
/// A coordinator drains once. Later calls return `AlreadyDraining`.
pub struct ShutdownCoordinator {
    steps: Mutex<Vec<Registered>>,
    mode: Mutex<ShutdownMode>,
    draining: AtomicBool,
    drained: CancellationToken,
    config: CoordinatorConfig,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            mode: Mutex::new(ShutdownMode::default()),
            draining: AtomicBool::new(false),
            drained: CancellationToken::new(),
            config,
        }
    }

    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Add a step to `phase`. Steps in the same phase run in registration
    /// order.
    pub fn register(&self, phase: DrainPhase, step: Arc<dyn DrainStep>) {
        info!(step = %step.name(), %phase, "Registered drain step");
        lock(&self.steps).push(Registered { phase, step });
    }

    pub fn set_mode(&self, mode: ShutdownMode) {
        *lock(&self.mode) = mode;
    }

    pub fn mode(&self) -> ShutdownMode {
        *lock(&self.mode)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Resolves once the drain sequence has run to completion, even if
    /// `drain` itself already returned on its deadline.
    pub async fn wait_drained(&self) {
        self.drained.cancelled().await;
    }

    /// Terminal shutdown with the configured deadline.
    pub async fn terminate(&self) -> Result<(), ShutdownError> {
        self.set_mode(ShutdownMode::Terminate);
        self.drain(self.config.drain_timeout).await
    }

    /// Run every registered step in phase order, racing `deadline`.
    pub async fn drain(&self, deadline: Duration) -> Result<(), ShutdownError> {
        if self.draining.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyDraining);
        }

        let mut steps = lock(&self.steps).clone();
        // Stable: registration order is kept within a phase.
        steps.sort_by_key(|s| s.phase);

        let mode = self.mode();
        info!(%mode, steps = steps.len(), ?deadline, "Draining");

        let started = Instant::now();
        let drained = self.drained.clone();
        let mut sequence = tokio::spawn(async move {
            let failures = run_steps(steps, started + deadline).await;
            drained.cancel();
            failures
        });

        match timeout(deadline, &mut sequence).await {
            Ok(Ok(failures)) if failures.is_empty() => {
                info!(%mode, elapsed = ?started.elapsed(), "Drain complete");
                Ok(())
            }
            Ok(Ok(failures)) if failures.iter().any(StepFailure::timed_out) => {
                warn!(%mode, ?deadline, failed = failures.len(), "Drain deadline reached by slow steps");
                Err(ShutdownError::Timeout { deadline })
            }
            Ok(Ok(failures)) => {
                warn!(%mode, failed = failures.len(), "Drain complete with failures");
                Err(ShutdownError::StepsFailed(failures))
            }
            Ok(Err(e)) => {
                error!(%mode, error = %e, "Drain sequence aborted");
                self.drained.cancel();
                Err(ShutdownError::Aborted(e.to_string()))
            }
            Err(_) => {
                warn!(%mode, ?deadline, "Drain deadline reached; remaining steps continue in background");
                Err(ShutdownError::Timeout { deadline })
            }
        }
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("steps", &lock(&self.steps).len())
            .field("mode", &self.mode())
            .field("draining", &self.is_draining())
            .field("config", &self.config)
            .finish()
    }
}

async fn run_steps(steps: Vec<Registered>, deadline: Instant) -> Vec<StepFailure> {
    let mut failures = Vec::new();
    let total = steps.len();

    for (index, Registered { phase, step }) in steps.into_iter().enumerate() {
        let name = step.name().to_string();
        let started = Instant::now();
        let left = u32::try_from(total - index).unwrap_or(u32::MAX);
        let budget = deadline.saturating_duration_since(started) / left;

        // Each step runs in its own task so a panic is contained and an
        // overrun can be abandoned without cancelling it.
        let mut task = tokio::spawn(async move { step.drain().await });
        let result = match timeout(budget, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => Err(DrainStepError::Panicked(panic_message(e.into_panic()))),
            Ok(Err(e)) => Err(DrainStepError::failed(e.to_string())),
            Err(_) => Err(DrainStepError::TimedOut(budget)),
        };

        match result {
            Ok(()) => info!(step = %name, %phase, elapsed = ?started.elapsed(), "Drain step finished"),
            Err(error) => {
                warn!(step = %name, %phase, %error, "Drain step failed");
                failures.push(StepFailure {
                    step: name,
                    phase,
                    error,
                });
            }
        }
    }

    failures
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    use super::*;
    use crate::shutdown::FnStep;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Panicky;

    #[async_trait]
    impl DrainStep for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn drain(&self) -> Result<(), DrainStepError> {
            panic!("agent exploded");
        }
    }

    fn recording(name: &'static str, log: &Log) -> Arc<dyn DrainStep> {
        let log = Arc::clone(log);
        Arc::new(FnStep::new(name, move || {
            let log = Arc::clone(&log);
            async move {
                lock(&log).push(name.to_string());
                Ok(())
            }
        }))
    }

    fn slow(delay: Duration, done: &Arc<AtomicBool>) -> Arc<dyn DrainStep> {
        let done = Arc::clone(done);
        Arc::new(FnStep::new("slow", move || {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(delay).await;
                done.store(true, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn steps_run_in_phase_then_registration_order() {
        let coordinator = ShutdownCoordinator::default();
        let log: Log = Arc::default();

        coordinator.register(DrainPhase::HttpListener, recording("http", &log));
        coordinator.register(DrainPhase::Processes, recording("processes", &log));
        coordinator.register(DrainPhase::HealthChecks, recording("tunnel-health", &log));
        coordinator.register(DrainPhase::HealthChecks, recording("domain-health", &log));
        coordinator.register(DrainPhase::Agents, recording("agents", &log));

        assert_ok!(coordinator.drain(Duration::from_secs(5)).await);
        assert_eq!(
            *lock(&log),
            vec!["tunnel-health", "domain-health", "agents", "processes", "http"]
        );
    }

    #[tokio::test]
    async fn failures_are_collected_and_sequence_continues() {
        let coordinator = ShutdownCoordinator::default();
        let log: Log = Arc::default();

        coordinator.register(
            DrainPhase::HealthChecks,
            Arc::new(FnStep::new("stuck-checker", || async {
                Err(DrainStepError::failed("checker wedged"))
            })),
        );
        coordinator.register(DrainPhase::Agents, Arc::new(Panicky));
        coordinator.register(DrainPhase::HttpListener, recording("http", &log));

        let err = coordinator.drain(Duration::from_secs(5)).await.unwrap_err();
        let ShutdownError::StepsFailed(failures) = err else {
            panic!("expected StepsFailed, got {err:?}");
        };

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].step, "stuck-checker");
        assert_eq!(failures[0].phase, DrainPhase::HealthChecks);
        assert_eq!(
            failures[1].error,
            DrainStepError::Panicked("agent exploded".to_string())
        );
        assert_eq!(*lock(&log), vec!["http"]);
    }

    #[tokio::test]
    async fn deadline_returns_early_and_slow_step_keeps_running() {
        let coordinator = ShutdownCoordinator::default();
        let done = Arc::new(AtomicBool::new(false));
        coordinator.register(DrainPhase::Processes, slow(Duration::from_millis(300), &done));

        let started = Instant::now();
        let err = coordinator.drain(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, ShutdownError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(!done.load(Ordering::SeqCst));

        coordinator.wait_drained().await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while !done.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("abandoned step was cancelled");
    }

    #[tokio::test]
    async fn stuck_step_does_not_block_later_phases() {
        let coordinator = ShutdownCoordinator::default();
        let log: Log = Arc::default();

        coordinator.register(
            DrainPhase::HealthChecks,
            Arc::new(FnStep::new("wedged-checker", || async {
                std::future::pending::<()>().await;
                Ok(())
            })),
        );
        coordinator.register(DrainPhase::HttpListener, recording("http", &log));

        let started = Instant::now();
        let err = coordinator.drain(Duration::from_millis(300)).await.unwrap_err();
        assert!(matches!(err, ShutdownError::Timeout { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(*lock(&log), vec!["http"]);
    }

    #[tokio::test]
    async fn overrun_is_recorded_against_its_share_of_the_deadline() {
        let steps = vec![
            Registered {
                phase: DrainPhase::HealthChecks,
                step: Arc::new(FnStep::new("wedged-checker", || async {
                    std::future::pending::<()>().await;
                    Ok(())
                })),
            },
            Registered {
                phase: DrainPhase::Processes,
                step: Arc::new(FnStep::new("quick", || async { Ok(()) })),
            },
        ];

        let failures = run_steps(steps, Instant::now() + Duration::from_millis(200)).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "wedged-checker");
        let DrainStepError::TimedOut(budget) = failures[0].error else {
            panic!("expected TimedOut, got {:?}", failures[0].error);
        };
        assert!(budget <= Duration::from_millis(100), "{budget:?}");
    }

    #[tokio::test]
    async fn second_drain_is_rejected() {
        let coordinator = Arc::new(ShutdownCoordinator::default());
        let done = Arc::new(AtomicBool::new(false));
        coordinator.register(DrainPhase::Agents, slow(Duration::from_millis(200), &done));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.drain(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(coordinator.is_draining());
        assert!(matches!(
            coordinator.drain(Duration::from_secs(5)).await,
            Err(ShutdownError::AlreadyDraining)
        ));
        assert_ok!(first.await.unwrap());
    }

    #[tokio::test]
    async fn mode_defaults_to_terminate() {
        let coordinator = ShutdownCoordinator::default();
        assert_eq!(coordinator.mode(), ShutdownMode::Terminate);
        coordinator.set_mode(ShutdownMode::Restart);
        assert_eq!(coordinator.mode(), ShutdownMode::Restart);

        assert_ok!(coordinator.terminate().await);
        assert_eq!(coordinator.mode(), ShutdownMode::Terminate);
    }
}

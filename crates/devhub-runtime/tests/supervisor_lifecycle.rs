//! End-to-end lifecycle tests against real `sh`/`sleep` children.
#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use devhub_core::{CommandSpec, HealthProbe, ProcessStatus};
use devhub_runtime::{
    FORCE_KILLED_EXIT_CODE, ProcessSupervisor, SupervisorConfig, SupervisorError, pid_exists,
};

const GRACE: Duration = Duration::from_millis(800);

fn config() -> SupervisorConfig {
    SupervisorConfig {
        stop_grace: GRACE,
        stop_wait: Duration::from_secs(5),
        health_poll: Duration::from_millis(100),
        optimistic_start: Duration::from_millis(150),
    }
}

/// Ignores SIGTERM (the disposition is inherited by `sleep`), so only the
/// SIGKILL escalation ends it.
fn stubborn() -> CommandSpec {
    CommandSpec::new("sh").args(["-c", "trap '' TERM; while true; do sleep 1; done"])
}

/// Reports up once `delay` has passed since creation.
struct DelayedProbe {
    ready_at: Instant,
}

impl DelayedProbe {
    fn new(delay: Duration) -> Self {
        Self {
            ready_at: Instant::now() + delay,
        }
    }
}

#[async_trait]
impl HealthProbe for DelayedProbe {
    async fn is_up(&self) -> bool {
        Instant::now() >= self.ready_at
    }
}

#[tokio::test]
async fn test_double_start_is_rejected_and_pid_unchanged() {
    let supervisor = ProcessSupervisor::new(config());
    let first = supervisor
        .start("proxy", "Proxy", CommandSpec::new("sleep").arg("60"), None)
        .await
        .unwrap();
    let pid = first.pid();
    assert!(pid.is_some());

    let err = supervisor
        .start("proxy", "Proxy again", CommandSpec::new("sleep").arg("60"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { .. }));

    let snapshot = supervisor.status("proxy").await.unwrap();
    assert_eq!(snapshot.pid, pid);
    assert_eq!(snapshot.name, "Proxy");
    assert!(snapshot.status.is_live());

    supervisor.stop("proxy").await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_when_sigterm_is_ignored() {
    let supervisor = ProcessSupervisor::new(config());
    let handle = supervisor
        .start("stubborn", "Stubborn", stubborn(), None)
        .await
        .unwrap();
    assert!(handle.wait_for_running(Duration::from_secs(1)).await);
    let pid = handle.pid().unwrap();

    let started = Instant::now();
    supervisor.stop("stubborn").await.unwrap();
    let elapsed = started.elapsed();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, ProcessStatus::Stopped);
    assert_eq!(snapshot.exit_code, Some(FORCE_KILLED_EXIT_CODE));
    assert!(elapsed >= GRACE, "escalated before grace: {elapsed:?}");
    assert!(
        elapsed < GRACE + Duration::from_millis(1500),
        "stop took too long: {elapsed:?}"
    );
    assert!(!pid_exists(pid));
}

#[tokio::test]
async fn test_stop_all_is_bounded_independent_of_count() {
    const COUNT: usize = 5;
    let supervisor = ProcessSupervisor::new(config());

    let mut handles = Vec::new();
    for i in 0..COUNT {
        let id = format!("stubborn-{i}");
        handles.push(supervisor.start(id.clone(), id, stubborn(), None).await.unwrap());
    }
    for handle in &handles {
        assert!(handle.wait_for_running(Duration::from_secs(1)).await);
    }

    let started = Instant::now();
    supervisor.stop_all().await;
    let elapsed = started.elapsed();

    // Serial stops would need COUNT × GRACE.
    assert!(
        elapsed < GRACE * 2 + Duration::from_millis(500),
        "stop_all took {elapsed:?} for {COUNT} processes"
    );
    for handle in &handles {
        assert_eq!(handle.status(), ProcessStatus::Stopped);
    }
}

#[tokio::test]
async fn test_proxy_becomes_healthy_then_stops() {
    let supervisor = ProcessSupervisor::new(config());
    let probe: Arc<dyn HealthProbe> = Arc::new(DelayedProbe::new(Duration::from_secs(2)));

    // Exits promptly with status 0 once SIGTERM arrives.
    let spec = CommandSpec::new("sh").args(["-c", "trap 'exit 0' TERM; while true; do sleep 0.1; done"]);
    let handle = supervisor
        .start("proxy", "Proxy", spec, Some(probe))
        .await
        .unwrap();

    let started = Instant::now();
    assert!(handle.wait_for_running(Duration::from_secs(5)).await);
    assert!(started.elapsed() >= Duration::from_millis(1800));
    assert!(supervisor.is_running("proxy").await);
    assert_eq!(
        supervisor.status("proxy").await.unwrap().status,
        ProcessStatus::Running
    );

    supervisor.stop("proxy").await.unwrap();

    let snapshot = supervisor.status("proxy").await.unwrap();
    assert_eq!(snapshot.status, ProcessStatus::Stopped);
    // Either the child's own exit won the race or escalation did.
    assert!(
        snapshot.exit_code == Some(FORCE_KILLED_EXIT_CODE) || snapshot.exit_code == Some(0),
        "unexpected exit code {:?}",
        snapshot.exit_code
    );
}

#[tokio::test]
async fn test_unhealthy_process_times_out() {
    let supervisor = ProcessSupervisor::new(config());
    let probe: Arc<dyn HealthProbe> = Arc::new(DelayedProbe::new(Duration::from_secs(60)));
    let handle = supervisor
        .start("slow", "Slow", CommandSpec::new("sleep").arg("60"), Some(probe))
        .await
        .unwrap();

    let started = Instant::now();
    assert!(!handle.wait_for_running(Duration::from_millis(400)).await);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(handle.snapshot().healthy, Some(false));

    supervisor.stop_all().await;
    assert!(handle.status().is_terminal());
}

/// Never answers within any reasonable readiness budget.
struct HangingCheck;

#[async_trait]
impl HealthProbe for HangingCheck {
    async fn is_up(&self) -> bool {
        tokio::time::sleep(Duration::from_secs(5)).await;
        true
    }
}

#[tokio::test]
async fn test_hanging_health_check_is_cut_off_at_timeout() {
    let supervisor = ProcessSupervisor::new(config());
    let check: Arc<dyn HealthProbe> = Arc::new(HangingCheck);
    let handle = supervisor
        .start("hung", "Hung", CommandSpec::new("sleep").arg("60"), Some(check))
        .await
        .unwrap();

    let started = Instant::now();
    assert!(!handle.wait_for_running(Duration::from_millis(200)).await);
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(1), "wait overran its timeout: {elapsed:?}");
    assert_eq!(handle.snapshot().healthy, Some(false));

    supervisor.stop_all().await;
}

#[tokio::test]
async fn test_stop_wait_shorter_than_grace_times_out_then_escalates() {
    let supervisor = ProcessSupervisor::new(SupervisorConfig {
        stop_wait: Duration::from_millis(300),
        ..config()
    });
    let handle = supervisor
        .start("stubborn", "Stubborn", stubborn(), None)
        .await
        .unwrap();
    assert!(handle.wait_for_running(Duration::from_secs(1)).await);
    let pid = handle.pid().unwrap();

    let err = supervisor.stop("stubborn").await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::StopTimeout { ref id, waited }
            if id == "stubborn" && waited == Duration::from_millis(300)
    ));
    assert_eq!(handle.status(), ProcessStatus::Stopping);

    // The escalation carries on after the caller gave up.
    let snapshot = tokio::time::timeout(GRACE * 3, handle.wait_for_exit())
        .await
        .expect("escalation never completed");
    assert_eq!(snapshot.status, ProcessStatus::Stopped);
    assert_eq!(snapshot.exit_code, Some(FORCE_KILLED_EXIT_CODE));
    assert!(!pid_exists(pid));
}

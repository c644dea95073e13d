//! Rediscoverable daemons racing for the same registry slot.
#![cfg(unix)]

use std::time::Duration;

use devhub_core::CommandSpec;
use devhub_runtime::{
    DaemonOutcome, DaemonRequest, LockedRegistry, ProcessSupervisor, SupervisorConfig,
    ensure_daemon, pid_exists, teardown_daemon,
};
use tempfile::TempDir;

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new(SupervisorConfig {
        stop_grace: Duration::from_millis(500),
        stop_wait: Duration::from_secs(3),
        health_poll: Duration::from_millis(50),
        optimistic_start: Duration::from_millis(200),
    })
}

fn request() -> DaemonRequest {
    DaemonRequest::new("proxy", CommandSpec::new("sleep").arg("60"), 9400)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_ensure_starts_exactly_one_daemon() {
    let dir = TempDir::new().unwrap();
    let registry = LockedRegistry::new(dir.path());

    // Two independent supervisors stand in for two server invocations.
    let first = supervisor();
    let second = supervisor();

    let (a, b) = tokio::join!(
        ensure_daemon(&first, &registry, request()),
        ensure_daemon(&second, &registry, request()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(
        u8::from(a.was_started()) + u8::from(b.was_started()),
        1,
        "expected one start and one attach: {a:?} / {b:?}"
    );
    assert_eq!(a.slot().pid, b.slot().pid);

    let owner = if a.was_started() { &first } else { &second };
    let saved = registry.load("proxy").unwrap().unwrap();
    assert!(pid_exists(saved.pid));

    let cleared = teardown_daemon(owner, &registry, "proxy", Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.pid, saved.pid);
    assert_eq!(registry.load("proxy").unwrap(), None);
}

#[tokio::test]
async fn test_orphaned_daemon_is_killed_by_pid() {
    let dir = TempDir::new().unwrap();
    let registry = LockedRegistry::new(dir.path());

    let owner = supervisor();
    let outcome = ensure_daemon(&owner, &registry, request()).await.unwrap();
    let DaemonOutcome::Started { handle, slot } = outcome else {
        panic!("nothing was running, expected a start");
    };

    // A fresh instance does not own the process and must fall back to the PID.
    let stranger = supervisor();
    let cleared = teardown_daemon(&stranger, &registry, "proxy", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(cleared.map(|s| s.pid), Some(slot.pid));

    let exited = tokio::time::timeout(Duration::from_secs(3), handle.wait_for_exit())
        .await
        .expect("daemon survived teardown");
    assert!(exited.status.is_terminal());
    assert_eq!(registry.load("proxy").unwrap(), None);
}

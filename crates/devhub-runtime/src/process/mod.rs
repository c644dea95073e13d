//! Process supervision for long-running child processes.
//!
//! # Structure
//!
//! - `ProcessSupervisor` - live table of processes started by this instance
//! - `ManagedProcess` / `ProcessHandle` - one child and its state machine
//! - monitor task - waits on exit, stop request or global cancellation
//! - `shutdown` - process-group signalling and PID-based kill
//! - `HttpHealthProbe` / `HealthWatch` - readiness and ongoing health

mod error;
mod health;
mod managed;
mod monitor;
pub mod shutdown;
mod stream;
mod supervisor;
mod watch;

pub use error::SupervisorError;
pub use health::HttpHealthProbe;
pub use managed::{FORCE_KILLED_EXIT_CODE, ManagedProcess, ProcessHandle};
pub use shutdown::{GroupSignal, kill_pid, signal_group};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
pub use watch::HealthWatch;

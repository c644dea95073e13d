//! Signal delivery for supervised processes.
//!
//! Provides two strategies:
//! - `signal_group`: signal a whole process group owned by a supervised child
//! - `kill_pid`: SIGTERM → SIGKILL for a daemon known only by PID (no reaping)

mod group;
mod pid;

pub use group::{GroupSignal, signal_group};
pub use pid::kill_pid;

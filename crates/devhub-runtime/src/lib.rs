//! OS-level runtime for devhub: supervised child processes, the locked slot
//! registry, ordered shutdown and in-place restart.
#![deny(unsafe_code)]

pub mod daemon;
pub mod process;
pub mod registry;
pub mod restart;
pub mod shutdown;

// Re-export the supervisor surface
pub use process::{
    FORCE_KILLED_EXIT_CODE, HealthWatch, HttpHealthProbe, ProcessHandle, ProcessSupervisor,
    SupervisorConfig, SupervisorError, kill_pid,
};

// Re-export registry primitives
pub use registry::{LockedRegistry, RegistryError, SlotGuard, pid_exists};

// Re-export rediscoverable daemon helpers
pub use daemon::{DaemonError, DaemonOutcome, DaemonRequest, ensure_daemon, teardown_daemon};

// Re-export shutdown and restart
pub use restart::{ExecRestart, RestartError};
pub use shutdown::{
    CoordinatorConfig, FnStep, HttpListenerStep, ShutdownCoordinator, ShutdownError,
    ShutdownMode, StepFailure, SupervisorStep,
};

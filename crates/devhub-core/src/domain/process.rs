//! Supervised process types: command specification, status and snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised process.
///
/// Transitions are monotonic along
/// `Pending → Starting → Running → {Stopping → Stopped, Error}`, with a
/// direct `Starting → Error` edge when the spawn itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl ProcessStatus {
    /// Stopped and Error are terminal and never re-entered.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    /// Any non-terminal state still owns (or is about to own) an OS process group.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal edge of the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Starting)
                | (Self::Starting, Self::Running | Self::Error)
                | (Self::Running, Self::Stopping | Self::Stopped | Self::Error)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// What to launch: executable, argv, working directory and env overrides.
///
/// This is an intent-based description; the supervisor decides how the
/// process is spawned (process group, piping, signal handling).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable path or name resolved through `PATH`.
    pub program: PathBuf,
    /// Arguments, not including argv[0].
    pub args: Vec<String>,
    /// Working directory (inherits the supervisor's when `None`).
    pub cwd: Option<PathBuf>,
    /// Environment overrides layered over the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Override one environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human-readable command line for logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Point-in-time view of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub name: String,
    pub status: ProcessStatus,
    /// OS process id, once spawned.
    pub pid: Option<u32>,
    /// Process group owned by this process (equal to `pid` on Unix).
    pub pgid: Option<u32>,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    /// `-1` marks a process that was force-killed or died by signal.
    pub exit_code: Option<i32>,
    pub last_error: Option<String>,
    /// Result of the most recent health probe, if one ran.
    pub healthy: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ProcessStatus::Stopped.is_terminal());
        assert!(ProcessStatus::Error.is_terminal());
        assert!(ProcessStatus::Stopping.is_live());
        assert!(ProcessStatus::Pending.is_live());
    }

    #[test]
    fn state_machine_edges() {
        use ProcessStatus::{Error, Pending, Running, Starting, Stopped, Stopping};

        assert!(Pending.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Error));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));

        assert!(!Stopped.can_transition_to(Running));
        assert!(!Error.can_transition_to(Starting));
        assert!(!Stopping.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Running));
    }

    #[test]
    fn command_spec_builder() {
        let spec = CommandSpec::new("cloudflared")
            .arg("tunnel")
            .args(["run", "--url", "http://127.0.0.1:7420"])
            .current_dir("/tmp")
            .env("TUNNEL_LOGLEVEL", "info");

        assert_eq!(spec.args.len(), 4);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.env.get("TUNNEL_LOGLEVEL").map(String::as_str), Some("info"));
        assert_eq!(
            spec.display_line(),
            "cloudflared tunnel run --url http://127.0.0.1:7420"
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessStatus::Stopping).unwrap();
        assert_eq!(json, "\"stopping\"");
    }
}

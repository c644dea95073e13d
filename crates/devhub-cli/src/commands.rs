//! Available subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Show resolved paths for all devhub directories
    Paths,

    /// Run the supervisor with a local status listener until signalled
    ///
    /// SIGINT/SIGTERM drain and exit; SIGHUP drains and restarts in place
    /// into the newest available binary.
    Serve {
        /// Port for the status listener (defaults to the configured port)
        #[arg(short, long, env = "DEVHUB_HTTP_PORT")]
        port: Option<u16>,
    },

    /// Start a named daemon (or attach to a running one) and supervise it
    Run(RunArgs),

    /// Inspect or clear registry slots
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Slot name (e.g. proxy, tunnel, opencode, or any other name)
    pub name: String,

    /// Port the daemon listens on
    #[arg(short, long)]
    pub port: u16,

    /// URL polled for readiness; 200 and 401 count as up
    #[arg(long)]
    pub health_url: Option<String>,

    /// Seconds to wait for the daemon to become healthy
    #[arg(long, default_value_t = 10)]
    pub ready_timeout: u64,

    /// Working directory for the daemon
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Command line to run, after `--`
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Subcommand)]
pub enum SlotCommand {
    /// List every recorded slot
    List,

    /// Print one slot as JSON
    Show {
        name: String,
    },

    /// Remove a slot
    Clear {
        name: String,
        /// Also stop the recorded process (SIGTERM, then SIGKILL)
        #[arg(long)]
        kill: bool,
    },
}

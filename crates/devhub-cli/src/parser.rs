//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Supervise local development daemons.
#[derive(Parser)]
#[command(name = "devhub")]
#[command(about = "Supervise local development daemons")]
#[command(version)]
pub struct Cli {
    /// Override the data directory for this invocation
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SlotCommand;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["devhub", "--verbose", "--data-dir", "/tmp/devhub", "paths"]);
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/devhub")));
        assert!(matches!(cli.command, Some(Commands::Paths)));
    }

    #[test]
    fn test_run_takes_trailing_command() {
        let cli = Cli::parse_from([
            "devhub", "run", "proxy", "--port", "8080", "--", "python3", "-m", "http.server", "8080",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.name, "proxy");
        assert_eq!(args.port, 8080);
        assert_eq!(args.command, vec!["python3", "-m", "http.server", "8080"]);
        assert_eq!(args.ready_timeout, 10);
    }

    #[test]
    fn test_slot_clear_kill_flag() {
        let cli = Cli::parse_from(["devhub", "slot", "clear", "tunnel", "--kill"]);
        let Some(Commands::Slot { command }) = cli.command else {
            panic!("expected slot");
        };
        assert!(matches!(
            command,
            SlotCommand::Clear { ref name, kill: true } if name == "tunnel"
        ));
    }
}

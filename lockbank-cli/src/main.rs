//! Lockbank CLI - deadlock causation and avoidance, live in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config, history, phase, run, HarnessArgs};

/// Lockbank - watch two bank transfers deadlock, then watch them not
#[derive(Parser)]
#[command(name = "lockbank", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Diagnostic log level (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    harness: HarnessArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four phases (default)
    Run {
        /// Opening balance for Account 1 (prompted when omitted)
        #[arg(long, allow_hyphen_values = true)]
        first: Option<String>,
        /// Opening balance for Account 2 (prompted when omitted)
        #[arg(long, allow_hyphen_values = true)]
        second: Option<String>,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Phase 1 only: concurrent deposit/withdraw pairs on one account
    Contention {
        #[command(flatten)]
        accounts: phase::AccountArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Phases 2 and 3 only: mirrored unsafe transfers and timeout detection
    Deadlock {
        #[command(flatten)]
        accounts: phase::AccountArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Phase 4 only: mirrored transfers with ordered locking
    Safe {
        #[command(flatten)]
        accounts: phase::AccountArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Outcomes of past runs
    History {
        #[command(subcommand)]
        command: history::HistoryCommands,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let command_name = cli.command.as_ref().map_or("run", Commands::name);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(command = command_name, error = ?e, "command failed");
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Contention { .. } => "contention",
            Commands::Deadlock { .. } => "deadlock",
            Commands::Safe { .. } => "safe",
            Commands::Config { .. } => "config",
            Commands::History { .. } => "history",
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let harness = cli.harness;
    match cli.command {
        None => run::run(None, None, false, &harness),
        Some(Commands::Run { first, second, json }) => run::run(first, second, json, &harness),
        Some(Commands::Contention { accounts, json }) => {
            phase::contention(&accounts, json, &harness)
        }
        Some(Commands::Deadlock { accounts, json }) => phase::deadlock(&accounts, json, &harness),
        Some(Commands::Safe { accounts, json }) => phase::safe(&accounts, json, &harness),
        Some(Commands::Config { command }) => config::run(command, &harness),
        Some(Commands::History { command }) => history::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["lockbank"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "warn");
        assert!(cli.harness.timeout_ms.is_none());
    }

    #[test]
    fn test_run_with_balances() {
        let cli = Cli::parse_from([
            "lockbank",
            "run",
            "--first",
            "500",
            "--second",
            "-3",
            "--json",
        ]);
        match cli.command {
            Some(Commands::Run { first, second, json }) => {
                assert_eq!(first.as_deref(), Some("500"));
                assert_eq!(second.as_deref(), Some("-3"));
                assert!(json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_harness_overrides() {
        let cli = Cli::parse_from([
            "lockbank",
            "--timeout-ms",
            "1500",
            "--hold-ms",
            "400",
            "deadlock",
            "--first",
            "10",
        ]);
        assert_eq!(cli.harness.timeout_ms, Some(1500));
        assert_eq!(cli.harness.hold_ms, Some(400));
        assert!(matches!(cli.command, Some(Commands::Deadlock { .. })));
        assert_eq!(cli.command.as_ref().map(Commands::name), Some("deadlock"));
    }

    #[test]
    fn test_history_prune() {
        let cli = Cli::parse_from(["lockbank", "history", "prune", "--keep", "5", "-f"]);
        match cli.command {
            Some(Commands::History {
                command: history::HistoryCommands::Prune { keep, force },
            }) => {
                assert_eq!(keep, 5);
                assert!(force);
            }
            _ => panic!("expected history prune"),
        }
    }
}

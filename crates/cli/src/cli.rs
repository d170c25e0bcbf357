use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keeps Kibana index patterns in step with the indices that exist.
///
/// Periodically infers the index patterns missing for the configured wildcard
/// templates and creates them, and optionally refreshes the field lists of
/// existing patterns.
#[derive(Parser, Debug)]
#[command(name = "autopattern", version, about)]
pub struct Cli {
    /// Path to the TOML config file (default: ./autopattern.toml if present).
    #[arg(long, short, env = "AUTOPATTERN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Seconds to wait for running tasks on shutdown.
    #[arg(long, env = "AUTOPATTERN_SHUTDOWN_TIMEOUT", default_value_t = 30, global = true)]
    pub shutdown_timeout: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the scheduler until SIGINT/SIGTERM (default).
    #[default]
    Run,
    /// Run every enabled task once and exit.
    Once,
    /// Validate the configuration and print the next run of each task.
    Check,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }
}

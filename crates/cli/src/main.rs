mod app;
mod cli;
mod logging;

use std::time::Duration;

use anyhow::Context;
use autopattern_core::config::{load_dotenv, Config};
use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let command = cli.command();
    if command == Command::Check {
        app::check(&config)?;
        println!("Configuration OK.");
        return Ok(());
    }

    logging::init(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "autopattern starting");
    config.log_summary();

    if command == Command::Once {
        app::once(config).await?;
    } else {
        app::run(config, Duration::from_secs(cli.shutdown_timeout)).await?;
    }

    info!("autopattern exited cleanly");
    Ok(())
}

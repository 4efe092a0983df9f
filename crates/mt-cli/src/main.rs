use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use mt_cli::commands::{self, Invocation, util};
use mt_cli::{Cli, Config};
use mt_core::SystemClock;
use mt_db::Tracker;

/// Load config and open the tracker, ensuring the database directory exists.
fn open_tracker(config_path: Option<&Path>) -> Result<Tracker> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    Tracker::open(&config.database_path, config.tracker_options())
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let invocation = Invocation {
        at: util::request_time(cli.at.as_deref(), cli.shift.as_deref(), &SystemClock)?,
        json: cli.json,
    };
    tracing::debug!(at = %invocation.at, "resolved request time");

    let mut tracker = open_tracker(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();
    commands::dispatch(&mut stdout, &mut tracker, command, &invocation)
}

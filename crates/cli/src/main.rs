//! Multivault CLI - replay routing scenarios and report allocation state.

mod cli;
mod commands;
mod output;
mod report;
mod scenario;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{run_inspect, run_scenario};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_scenario(&args, cli.format)?,
        Commands::Inspect(args) => run_inspect(&args, cli.format)?,
    }

    Ok(())
}

//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Multivault CLI - replay routing scenarios against a simulated deployment
#[derive(Parser, Debug)]
#[command(name = "multivault")]
#[command(about = "Scenario runner for multi-backend pooled vaults", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the system from a scenario, replay its steps, and report the final state
    Run(RunArgs),
    /// Build the system from a scenario and report its configuration without replaying steps
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file (can also use MULTIVAULT_SCENARIO env var)
    #[arg(env = "MULTIVAULT_SCENARIO")]
    pub scenario: PathBuf,

    /// Stop at the first failing step and exit with an error
    #[arg(long)]
    pub strict: bool,

    /// Include the event log in the report
    #[arg(long)]
    pub events: bool,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Scenario file (can also use MULTIVAULT_SCENARIO env var)
    #[arg(env = "MULTIVAULT_SCENARIO")]
    pub scenario: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod config;
mod demo;

pub use demo::DemoArgs;

use anyhow::{Context, Result};
use clap::Subcommand;
use jobkit_runner::RunnerConfig;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Launch a batch of sleeping jobs and report how each one ended
    Demo(DemoArgs),
    /// Show the runner configuration resolved from the environment
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Loads the runner configuration from the environment, then routes the
/// command to its handler module.
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = RunnerConfig::from_env().context("Invalid runner configuration")?;

    match command {
        Commands::Demo(args) => demo::handle_demo_command(args, config).await,
        Commands::Config { json } => config::show_config(&config, json),
    }
}

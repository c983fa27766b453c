//! Jobkit CLI
//!
//! Command-line driver for the job runner: launches demonstration workloads
//! and reports how each job ended.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobkit")]
#[command(about = "Launch and observe jobs with timeouts and cancellation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON reports on stdout stay parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobkit_runner=info,jobkit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    handle_command(cli.command).await
}

//! Linkrelay consumer entry point
//!
//! Pulls links from the crawl queue, crawls them, and republishes the
//! internal links found, until the queue drains or the process is stopped.

use anyhow::Context;
use clap::Parser;
use linkrelay::config::load_config_with_hash;
use linkrelay::logging::init_logging;
use linkrelay::roles::{run_consumer, shutdown_signal};
use std::path::PathBuf;

/// Propagate a Linkrelay crawl from the queue
#[derive(Parser, Debug)]
#[command(name = "linkrelay-consumer")]
#[command(version)]
#[command(about = "Crawl queued links and requeue the internal links they contain", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let (config, hash) =
        load_config_with_hash(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!("Configuration loaded (hash: {})", hash);

    match run_consumer(&config, shutdown_signal()).await {
        Ok((exit, summary)) => {
            tracing::info!("Consumer finished ({:?}): {}", exit, summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Consumer failed: {}", e);
            Err(e.into())
        }
    }
}

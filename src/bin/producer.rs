//! Linkrelay producer entry point
//!
//! Fetches one seed page, publishes its internal links, and exits.

use anyhow::Context;
use clap::Parser;
use linkrelay::config::load_config_with_hash;
use linkrelay::logging::init_logging;
use linkrelay::roles::{run_producer, shutdown_signal};
use std::path::PathBuf;

/// Seed a Linkrelay crawl from one page
#[derive(Parser, Debug)]
#[command(name = "linkrelay-producer")]
#[command(version)]
#[command(about = "Publish the internal links of a seed page to the crawl queue", long_about = None)]
struct Cli {
    /// Absolute URL of the page to start from
    #[arg(value_name = "SEED_URL")]
    seed: String,

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

    match run_producer(&config, &cli.seed, shutdown_signal()).await {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::error!("Producer failed: {}", e);
            Err(e.into())
        }
    }
}

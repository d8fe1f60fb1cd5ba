//! PowerStream to Home Assistant MQTT bridge daemon.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use psbridge_core::{BridgeConfig, BridgeService};

/// Bridge EcoFlow PowerStream inverters to Home Assistant MQTT discovery.
#[derive(Parser, Debug)]
#[command(name = "psbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON options file.
    #[arg(long, default_value = "/data/options.json")]
    config: PathBuf,

    /// Verbose output (debug-level logging).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = BridgeConfig::load(&args.config)?;
    info!(
        "starting psbridge {} against {}",
        env!("CARGO_PKG_VERSION"),
        config.full_broker_addr()
    );

    BridgeService::new(config).run().await
}

//! Gatehouse master node binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: ./data, collector on localhost
//! gatehouse
//!
//! # Configuration file with command-line overrides
//! gatehouse --config gatehouse.toml --collector-url https://collector.example/api.php
//! ```

use std::path::PathBuf;

use clap::Parser;
use gatehouse_server::{Config, Gatehouse, HttpCollector, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gatehouse master node
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(about = "Access-control master node with nightly log upload")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the key, device and log tables
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Endpoint receiving uploaded log batches
    #[arg(long)]
    collector_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(url) = args.collector_url {
        config.collector.url = url;
    }

    tracing::info!("Gatehouse starting");

    let collector = HttpCollector::new(&config.collector)?;
    tracing::info!(url = %collector.url(), "uploading logs nightly");

    let gatehouse = Gatehouse::start(&config, collector, SystemEnv::new())?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    gatehouse.shutdown().await?;

    Ok(())
}

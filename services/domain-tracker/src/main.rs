//! Domain tracker CLI
//!
//! Command-line interface for the Pi-hole query log watcher.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use domain_tracker::io::ReqwestHttpClient;
use domain_tracker::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "domain-tracker")]
#[command(about = "Fires an event when a client looks up a domain on Pi-hole")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Validate configured endpoints and credentials, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, dashboard_port={:?}, log_level={:?}, check={}",
        args.config,
        args.dashboard_port,
        args.log_level,
        args.check
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets()?;

    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    if args.check {
        config.validate()?;
        domain_tracker::check_endpoints(&config, Arc::new(ReqwestHttpClient::new())).await?;
        tracing::info!("All {} tracker(s) validated", config.trackers.len());
        return Ok(());
    }

    tracing::info!("Starting domain tracker service");
    tracing::debug!(
        "Trackers: {}, Webhooks: {}",
        config.trackers.len(),
        config.webhooks.len()
    );

    domain_tracker::run(config).await?;

    Ok(())
}

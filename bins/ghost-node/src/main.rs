//! Ghost full node binary.
//!
//! Starts the peer fleet, the health responder, and the message router
//! over the in-memory reference stores.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use ghost_node_lib::{Node, NodeConfig};
use tracing::{error, info};

/// Ghost full node.
#[derive(Parser, Debug)]
#[command(name = "ghost-node", version, about = "Ghost full node")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ghost protocol listen port
    #[arg(long)]
    port: Option<u16>,

    /// Health-check listen port
    #[arg(long)]
    health_port: Option<u16>,

    /// Seed peers (comma-separated "ip:port")
    #[arg(long, value_delimiter = ',')]
    seed_peers: Vec<String>,

    /// Data directory for persistent stores
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Layer CLI flags over the config file (or the defaults).
    fn into_config(self) -> Result<(NodeConfig, String), anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(health_port) = self.health_port {
            config.health_port = health_port;
        }
        if !self.seed_peers.is_empty() {
            config.seed_peers = self.seed_peers;
        }
        if let Some(data_path) = self.data_path {
            config.data_path = data_path;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        Ok((config, self.log_format))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format) = match args.into_config() {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("configuration error: {err}");
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("Ghost node v{}", env!("CARGO_PKG_VERSION"));
    info!(port = config.port, health_port = config.health_port, "listening configuration");
    info!(data_path = %config.data_path.display(), "data path");
    info!(seed_peers = ?config.seed_peers, "seed peers");

    if let Err(err) = std::fs::create_dir_all(&config.data_path) {
        error!(error = %err, "failed to create data path");
        process::exit(1);
    }

    let node = match Node::start(config).await {
        Ok(node) => node,
        Err(err) => {
            error!(error = %err, "failed to start node");
            process::exit(1);
        }
    };

    info!("Ghost node running (Ctrl+C to stop)");

    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install Ctrl+C handler");
        process::exit(1);
    }
    info!(
        connected = node.fleet.connected_handlers().len(),
        "shutdown signal received"
    );
    info!("Ghost node shutdown complete");
}

/// Initialize tracing with the given log level and output format.
///
/// Pass `format = "json"` for structured output; anything else is
/// human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

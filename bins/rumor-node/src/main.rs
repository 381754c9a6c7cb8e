//! Rumor engine daemon.
//!
//! Opens the RocksDB ledger, serves the JSON-RPC interface, and runs the
//! periodic resolution sweep until Ctrl+C.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rumor_node_lib::{Node, NodeConfig, start_rpc_server};
use tracing::info;

/// Rumor trust engine node.
#[derive(Parser, Debug)]
#[command(
    name = "rumor-node",
    version,
    about = "Stake-weighted trust scoring and resolution for anonymous claims"
)]
struct Args {
    /// Optional TOML config file; `RUMOR_*` env vars and flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the ledger and identity salt
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,

    /// Seconds between resolution sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,
}

impl Args {
    /// Apply CLI overrides on top of file and environment config.
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(bind) = self.rpc_bind {
            config.rpc_bind = bind;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(secs) = self.sweep_interval {
            config.sweep_interval_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.log_level, &config.log_format);

    info!("Rumor node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());
    info!("sweep_interval: {}s", config.sweep_interval().as_secs());

    let node = Node::open(config.clone()).context("opening node")?;
    info!("Node initialized");

    let rpc_handle = start_rpc_server(&config.rpc_addr(), node.clone())
        .await
        .context("starting RPC server")?;
    info!("RPC server listening on {}", config.rpc_addr());

    info!("Rumor node running (Ctrl+C to stop)");

    tokio::select! {
        _ = node.run() => {
            info!("sweeper exited");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing Ctrl+C handler")?;
            info!("shutdown signal received");
        }
    }

    rpc_handle.stop().ok();
    info!("RPC server stopped");
    node.shutdown();
    info!("Rumor node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "rumor-node",
            "--data-dir",
            "/tmp/rumor-test",
            "--rpc-port",
            "9999",
            "--sweep-interval",
            "60",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/rumor-test"));
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.rpc_bind, "127.0.0.1");
    }
}

//! Sparkplug Node - Sparkplug B edge node for host telemetry
//!
//! Connects to an MQTT broker and publishes under `spBv1.0/{group}/.../{node}`:
//! - NBIRTH on connect (and on rebirth request)
//! - NDATA with CPU / disk usage every interval
//! - NDEATH as last will

use anyhow::{Context, Result};
use clap::Parser;
use sparkplug_node::{Cli, Node, NodeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sparkplug_node=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Sparkplug Node v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = NodeConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    config.apply_cli(&cli);

    let node = Node::new(&config).context("Failed to create node")?;

    node.run().await.context("Node execution failed")?;

    info!("Sparkplug Node stopped");
    Ok(())
}

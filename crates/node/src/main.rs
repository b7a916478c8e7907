//! mxn - node client for the mx lock service
//!
//! Dials the coordinator, keeps a heartbeat going, and exposes an
//! interactive loop for requesting, writing to, and releasing the shared
//! resource.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

mod client;
mod console;
mod state;

use crate::client::NodeClient;

#[derive(Parser)]
#[command(name = "mxn")]
#[command(about = "Node client for the mx lock service")]
#[command(version)]
struct Cli {
    /// Identity announced to the coordinator
    node_id: String,

    /// Coordinator address
    #[arg(long, default_value = "127.0.0.1:8080")]
    coordinator: String,

    /// Heartbeat period, in seconds
    #[arg(long, default_value_t = 3)]
    heartbeat_period: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep stdout for the command loop; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = NodeClient::connect(
        &cli.coordinator,
        &cli.node_id,
        Duration::from_secs(cli.heartbeat_period),
    )
    .await
    .with_context(|| format!("failed to connect to coordinator at {}", cli.coordinator))?;

    println!(
        "node {} connected to coordinator at {}",
        cli.node_id, cli.coordinator
    );
    console::run(client).await;
    Ok(())
}

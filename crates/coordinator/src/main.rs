// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mxd: central coordinator for the mx lock service.
//!
//! Serializes critical-section requests from remote nodes over TCP and
//! mediates every write to the shared resource.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use mx_coordinator::console;
use mx_coordinator::lifecycle::{self, Config};
use mx_coordinator::monitor::MonitorConfig;

#[derive(Parser)]
#[command(name = "mxd")]
#[command(about = "Central coordinator for the mx lock service")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Shared resource file (created fresh at startup)
    #[arg(long, default_value = "shared_resource.txt")]
    resource: PathBuf,

    /// Failure detector scan period, in seconds
    #[arg(long, default_value_t = 5)]
    scan_period: u64,

    /// Seconds of silence before a session is considered dead
    #[arg(long, default_value_t = 10)]
    idle_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The console owns stdout; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config {
        listen_addr: cli.listen,
        resource_path: cli.resource,
        monitor: MonitorConfig {
            scan_period: Duration::from_secs(cli.scan_period),
            idle_timeout: Duration::from_secs(cli.idle_timeout),
        },
    };

    let daemon = match lifecycle::startup(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("failed to start coordinator: {}", e);
            return Err(e.into());
        }
    };

    let arbiter = daemon.arbiter();
    let server = tokio::spawn(daemon.serve());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = console::run(arbiter) => info!("console quit, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    server.abort();
    info!("coordinator stopped");
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator lifecycle: configuration, startup, and the accept loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::arbiter::Arbiter;
use crate::monitor::{self, MonitorConfig};
use crate::resource::SharedResource;
use crate::server;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the TCP listener binds.
    pub listen_addr: SocketAddr,
    /// Shared resource file, created fresh at startup.
    pub resource_path: PathBuf,
    /// Failure detector timing.
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            resource_path: PathBuf::from("shared_resource.txt"),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Lifecycle errors; all of these are fatal to the process.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to create shared resource at {0}: {1}")]
    ResourceOpen(PathBuf, #[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, #[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started coordinator: bound listener plus the shared arbiter.
#[derive(Debug)]
pub struct Daemon {
    listener: TcpListener,
    arbiter: Arc<Arbiter>,
    monitor: MonitorConfig,
}

/// Create the shared resource and bind the listener. Queue and holder state
/// do not persist across restarts, so there is nothing to recover.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let resource = SharedResource::create(&config.resource_path)
        .map_err(|e| LifecycleError::ResourceOpen(config.resource_path.clone(), e))?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen_addr, e))?;

    info!(
        addr = %listener.local_addr()?,
        resource = %config.resource_path.display(),
        "coordinator listening"
    );

    Ok(Daemon {
        listener,
        arbiter: Arc::new(Arbiter::new(resource)),
        monitor: config.monitor,
    })
}

impl Daemon {
    /// The bound address; useful when the configured port was 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the arbiter, for the console and for tests.
    pub fn arbiter(&self) -> Arc<Arbiter> {
        Arc::clone(&self.arbiter)
    }

    /// Accept connections forever, with the failure detector running in the
    /// background. Never returns; drive it from a task and drop that task
    /// to shut down.
    pub async fn serve(self) {
        let _monitor = tokio::spawn(monitor::run(Arc::clone(&self.arbiter), self.monitor));

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    tokio::spawn(server::handle_connection(Arc::clone(&self.arbiter), stream));
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Networking client: owns the connection to the coordinator and the
//! background reader, writer, and heartbeat tasks.
//!
//! Transport loss is terminal: the connected flag flips, the operator is
//! told, and further commands fail. There is no auto-reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mx_core::{protocol, LamportClock, Message, MessageKind};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::{GuardError, Machine, Phase};

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Guard(#[from] GuardError),

    #[error("connection to coordinator lost")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time view for the `status` command.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub node_id: String,
    pub clock: i64,
    pub connected: bool,
    pub phase: Phase,
}

pub struct NodeClient {
    node_id: String,
    clock: Arc<LamportClock>,
    machine: Arc<Mutex<Machine>>,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl NodeClient {
    /// Dial the coordinator, announce with JOIN, and start the background
    /// tasks.
    pub async fn connect(
        addr: &str,
        node_id: &str,
        heartbeat_period: Duration,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let client = Self {
            node_id: node_id.to_string(),
            clock: Arc::new(LamportClock::new()),
            machine: Arc::new(Mutex::new(Machine::new())),
            connected: Arc::new(AtomicBool::new(true)),
            outbound,
        };

        tokio::spawn(write_loop(
            write_half,
            outbound_rx,
            Arc::clone(&client.connected),
        ));
        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&client.machine),
            Arc::clone(&client.clock),
            Arc::clone(&client.connected),
        ));
        tokio::spawn(heartbeat_loop(
            client.outbound.clone(),
            Arc::clone(&client.clock),
            client.node_id.clone(),
            Arc::clone(&client.connected),
            heartbeat_period,
        ));

        client.send(Message::join(node_id, client.clock.tick()))?;
        Ok(client)
    }

    /// Ask for the critical section. A pending request or a held section
    /// makes this a guarded no-op.
    pub fn request_access(&self) -> Result<(), ClientError> {
        self.ensure_connected()?;
        self.lock_machine().request()?;
        self.send(Message::request(self.node_id.as_str(), self.clock.tick()))
    }

    /// Send a payload to the shared resource; only valid while holding.
    pub fn write(&self, content: &str) -> Result<(), ClientError> {
        self.ensure_connected()?;
        self.lock_machine().check_write()?;
        self.send(Message::write(
            self.node_id.as_str(),
            self.clock.tick(),
            content,
        ))
    }

    /// Give the critical section back.
    pub fn release(&self) -> Result<(), ClientError> {
        self.ensure_connected()?;
        self.lock_machine().release()?;
        self.send(Message::release(self.node_id.as_str(), self.clock.tick()))
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.node_id.clone(),
            clock: self.clock.time(),
            connected: self.connected.load(Ordering::SeqCst),
            phase: self.lock_machine().phase(),
        }
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Disconnected)
        }
    }

    fn send(&self, message: Message) -> Result<(), ClientError> {
        self.outbound
            .send(message)
            .map_err(|_| ClientError::Disconnected)
    }

    fn lock_machine(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Message>,
    connected: Arc<AtomicBool>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = protocol::write_message(&mut writer, &message).await {
            debug!(error = %e, "outbound write failed");
            connected.store(false, Ordering::SeqCst);
            break;
        }
    }
}

/// Consume coordinator traffic. GRANT flips the machine to Holding;
/// everything else only advances the clock.
async fn read_loop(
    read_half: OwnedReadHalf,
    machine: Arc<Mutex<Machine>>,
    clock: Arc<LamportClock>,
    connected: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "read failed");
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        let message = match protocol::decode(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "skipping malformed line");
                continue;
            }
        };
        clock.observe(message.timestamp);
        match message.kind {
            MessageKind::Grant => {
                let granted = machine.lock().unwrap_or_else(|e| e.into_inner()).grant();
                if granted {
                    println!("access granted: you now hold the critical section");
                    println!("use 'write <text>' to append, 'release' to give it up");
                } else {
                    warn!("ignoring grant received while not requesting");
                }
            }
            _ => debug!(kind = ?message.kind, "ignoring message from coordinator"),
        }
    }
    connected.store(false, Ordering::SeqCst);
    println!("connection to coordinator lost");
}

async fn heartbeat_loop(
    outbound: mpsc::UnboundedSender<Message>,
    clock: Arc<LamportClock>,
    node_id: String,
    connected: Arc<AtomicBool>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The immediate first tick is redundant with JOIN
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !connected.load(Ordering::SeqCst) {
            break;
        }
        if outbound
            .send(Message::heartbeat(node_id.as_str(), clock.tick()))
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection plumbing: a reader loop that decodes framed lines into
//! the arbiter, and a writer task that drains the connection's outbound
//! channel onto the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mx_core::{protocol, Message};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::arbiter::{Arbiter, TransportHandle};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Service one accepted connection until EOF or a transport error, then
/// tear down the session bound to it.
pub async fn handle_connection(arbiter: Arc<Arbiter>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let (read_half, write_half) = stream.into_split();

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_outbound(write_half, outbound_rx));

    let node_id = read_inbound(&arbiter, read_half, conn_id, &outbound).await;

    // Scoped to this connection so a session that re-joined elsewhere
    // survives the stale close
    if let Some(node_id) = node_id {
        arbiter.remove_session(&node_id, Some(conn_id));
    }
    debug!(conn_id, peer = ?peer, "connection closed");
}

/// Read framed lines and dispatch them. Malformed lines are logged and
/// skipped; only EOF or a read error ends the loop. Returns the identity
/// this connection bound to, if any message carried one.
async fn read_inbound(
    arbiter: &Arbiter,
    read_half: OwnedReadHalf,
    conn_id: u64,
    handle: &TransportHandle,
) -> Option<String> {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let mut bound: Option<String> = None;

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id, error = %e, "read failed");
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        let message = match protocol::decode(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(conn_id, error = %e, "skipping malformed line");
                continue;
            }
        };
        if bound.is_none() {
            bound = Some(message.node_id.clone());
        }
        arbiter.handle_message(message, conn_id, handle);
    }

    bound
}

/// Drain outbound messages onto the socket. Exits when the channel closes
/// or the peer stops accepting writes; the closed channel is what makes a
/// dead handle visible to the scheduler.
async fn write_outbound(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = protocol::write_message(&mut writer, &message).await {
            debug!(error = %e, "outbound write failed");
            break;
        }
    }
}

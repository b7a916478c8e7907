// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request arbiter: all shared coordinator state and the single-holder
//! state machine.
//!
//! One readers-writer lock protects the client table, the pending-request
//! queue, the holder slot, the access log, and the shared resource.
//! Message handlers take the lock in write mode for the whole operation;
//! console snapshots take it in read mode. Grants are delivered through the
//! queue entry's cached channel sender, so no socket write ever happens
//! under the lock.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use mx_core::{LamportClock, Message, MessageKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::access_log::AccessLogRing;
use crate::resource::SharedResource;

/// Outbound side of a connection. Sending fails once the connection's
/// writer task is gone, which is how a revoked handle becomes observable.
pub type TransportHandle = mpsc::UnboundedSender<Message>;

/// A live connected node.
#[derive(Debug)]
struct ClientSession {
    /// Connection the session is currently bound to; teardown of an older
    /// connection for the same identity is ignored.
    conn_id: u64,
    handle: TransportHandle,
    last_seen: Instant,
    in_critical: bool,
}

/// A pending request awaiting grant. The transport handle is cached here so
/// the grant needs no client-table lookup.
#[derive(Debug)]
struct QueueEntry {
    node_id: String,
    lamport_ts: i64,
    handle: TransportHandle,
}

#[derive(Debug)]
struct State {
    clients: HashMap<String, ClientSession>,
    queue: Vec<QueueEntry>,
    holder: Option<String>,
    access_log: AccessLogRing,
    resource: SharedResource,
}

/// One client row in a status snapshot.
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub node_id: String,
    pub in_critical: bool,
    pub idle_for: Duration,
}

/// One queue row in a status snapshot.
#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub node_id: String,
    pub lamport_ts: i64,
}

/// Point-in-time view of the arbiter, taken under the read lock.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub clock: i64,
    pub holder: Option<String>,
    pub clients: Vec<ClientStatus>,
    pub queue: Vec<QueueStatus>,
}

#[derive(Debug)]
pub struct Arbiter {
    state: RwLock<State>,
    clock: LamportClock,
}

impl Arbiter {
    pub fn new(resource: SharedResource) -> Self {
        Self {
            state: RwLock::new(State {
                clients: HashMap::new(),
                queue: Vec::new(),
                holder: None,
                access_log: AccessLogRing::new(),
                resource,
            }),
            clock: LamportClock::new(),
        }
    }

    /// Service one inbound message from connection `conn_id`.
    pub fn handle_message(&self, message: Message, conn_id: u64, handle: &TransportHandle) {
        self.clock.observe(message.timestamp);

        let mut state = self.write_state();

        // Any traffic from a known session counts as liveness
        if let Some(session) = state.clients.get_mut(&message.node_id) {
            session.last_seen = Instant::now();
        }

        match message.kind {
            MessageKind::Join => {
                let node_id = message.node_id;
                // A re-join replaces the transport; pending requests follow
                // it so a grant cannot land on the dead connection.
                for entry in state.queue.iter_mut().filter(|e| e.node_id == node_id) {
                    entry.handle = handle.clone();
                }
                let holds_lock = state.holder.as_deref() == Some(node_id.as_str());
                let replaced = state
                    .clients
                    .insert(
                        node_id.clone(),
                        ClientSession {
                            conn_id,
                            handle: handle.clone(),
                            last_seen: Instant::now(),
                            in_critical: holds_lock,
                        },
                    )
                    .is_some();
                if replaced {
                    info!(node_id = %node_id, "node re-joined, transport replaced");
                } else {
                    info!(node_id = %node_id, "node joined");
                }
                state.access_log.push(format!("{} joined the system", node_id));
            }

            MessageKind::Request => {
                let node_id = message.node_id;
                info!(node_id = %node_id, timestamp = message.timestamp, "access requested");
                match state.queue.iter().position(|e| e.node_id == node_id) {
                    // Duplicate request: keep the earliest stamp, never a
                    // second entry. The node machine already forbids
                    // double-requesting.
                    Some(i) => {
                        let entry = &mut state.queue[i];
                        entry.lamport_ts = entry.lamport_ts.min(message.timestamp);
                        entry.handle = handle.clone();
                    }
                    None => state.queue.push(QueueEntry {
                        node_id,
                        lamport_ts: message.timestamp,
                        handle: handle.clone(),
                    }),
                }
                self.schedule(&mut state);
            }

            MessageKind::Release => {
                if state.holder.as_deref() != Some(message.node_id.as_str()) {
                    // Late releases after holder death are benign
                    debug!(node_id = %message.node_id, "release from non-holder ignored");
                    return;
                }
                info!(node_id = %message.node_id, "critical section released");
                state.holder = None;
                if let Some(session) = state.clients.get_mut(&message.node_id) {
                    session.in_critical = false;
                }
                self.schedule(&mut state);
            }

            MessageKind::Heartbeat => {
                // last_seen was refreshed above; an unknown sender is dropped
                debug!(node_id = %message.node_id, "heartbeat");
            }

            MessageKind::Write => {
                if state.holder.as_deref() != Some(message.node_id.as_str()) {
                    debug!(node_id = %message.node_id, "write from non-holder dropped");
                    return;
                }
                match state.resource.append(&message.node_id, &message.content) {
                    Ok(stamp) => {
                        info!(node_id = %message.node_id, content = %message.content, "wrote to shared resource");
                        state
                            .access_log
                            .push(format!("{} wrote to the resource at {}", message.node_id, stamp));
                    }
                    Err(e) => {
                        // The write is lost; the session stays up
                        error!(node_id = %message.node_id, error = %e, "shared resource append failed");
                    }
                }
            }

            MessageKind::Grant => {
                debug!(node_id = %message.node_id, "unexpected GRANT from client dropped");
            }
        }
    }

    /// Remove a session: purge its queue entries and, if it held the lock,
    /// free the critical section and grant the next requester.
    ///
    /// When `conn_id` is given, the removal only applies if the session is
    /// still bound to that connection; a stale socket closing cannot tear
    /// down a session that re-joined on a newer connection.
    pub fn remove_session(&self, node_id: &str, conn_id: Option<u64>) {
        let mut state = self.write_state();

        match state.clients.get(node_id) {
            None => return,
            Some(session) if conn_id.is_some_and(|id| id != session.conn_id) => {
                debug!(node_id = %node_id, "ignoring teardown from superseded connection");
                return;
            }
            Some(_) => {}
        }

        state.clients.remove(node_id);
        state.queue.retain(|entry| entry.node_id != node_id);
        state.access_log.push(format!("{} left the system", node_id));
        info!(node_id = %node_id, "session removed");

        if state.holder.as_deref() == Some(node_id) {
            state.holder = None;
            self.schedule(&mut state);
        }
    }

    /// Node ids silent for longer than `idle_timeout`, collected under the
    /// read lock for the failure detector.
    pub fn expired_sessions(&self, idle_timeout: Duration) -> Vec<String> {
        let state = self.read_state();
        let now = Instant::now();
        state
            .clients
            .iter()
            .filter(|(_, session)| now.duration_since(session.last_seen) > idle_timeout)
            .map(|(node_id, _)| node_id.clone())
            .collect()
    }

    /// Snapshot for the operator console. Clients are sorted by id for
    /// stable output; the queue is shown in arrival order.
    pub fn status(&self) -> StatusSnapshot {
        let state = self.read_state();
        let now = Instant::now();
        let mut clients: Vec<ClientStatus> = state
            .clients
            .iter()
            .map(|(node_id, session)| ClientStatus {
                node_id: node_id.clone(),
                in_critical: session.in_critical,
                idle_for: now.duration_since(session.last_seen),
            })
            .collect();
        clients.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        StatusSnapshot {
            clock: self.clock.time(),
            holder: state.holder.clone(),
            clients,
            queue: state
                .queue
                .iter()
                .map(|entry| QueueStatus {
                    node_id: entry.node_id.clone(),
                    lamport_ts: entry.lamport_ts,
                })
                .collect(),
        }
    }

    /// Access-log entries, oldest first.
    pub fn access_log(&self) -> Vec<String> {
        self.read_state().access_log.iter().map(str::to_string).collect()
    }

    /// Contents of the shared resource file.
    pub fn resource_contents(&self) -> std::io::Result<String> {
        self.read_state().resource.contents()
    }

    /// Grant the critical section to the lex-smallest `(timestamp, node_id)`
    /// pending request, if the section is free.
    ///
    /// The queue is re-sorted on every pass: a late-arriving request may
    /// carry a smaller stamp than entries queued before it, and at the
    /// single-digit client counts this serves, a sort beats maintaining a
    /// priority structure under arbitrary updates.
    fn schedule(&self, state: &mut State) {
        loop {
            if state.holder.is_some() || state.queue.is_empty() {
                return;
            }
            state.queue.sort_by(|a, b| {
                a.lamport_ts
                    .cmp(&b.lamport_ts)
                    .then_with(|| a.node_id.cmp(&b.node_id))
            });
            let entry = state.queue.remove(0);

            let grant = Message::grant(self.clock.tick());
            if entry.handle.send(grant).is_err() {
                // Transport gone: treat as an immediate release and retry
                debug!(node_id = %entry.node_id, "grant undeliverable, dropping entry");
                continue;
            }

            if let Some(session) = state.clients.get_mut(&entry.node_id) {
                session.in_critical = true;
            }
            info!(node_id = %entry.node_id, "critical section granted");
            state.holder = Some(entry.node_id);
            return;
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Test hook: age a session so failure-detector paths can run without
    /// real waiting.
    #[cfg(test)]
    pub(crate) fn backdate_session(&self, node_id: &str, age: Duration) {
        let mut state = self.write_state();
        if let Some(session) = state.clients.get_mut(node_id) {
            session.last_seen = Instant::now() - age;
        }
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;

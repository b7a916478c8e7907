// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message taxonomy shared by the coordinator and nodes.
//!
//! The wire discriminator is a sum type so dispatch is exhaustive; the
//! serialized spelling (`"type"`, upper-case variants) is fixed by the
//! protocol.

use serde::{Deserialize, Serialize};

/// Sender identity carried by coordinator-originated messages.
pub const COORDINATOR_ID: &str = "COORDINATOR";

/// The six message kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Client announces presence on this connection.
    Join,
    /// Client asks to enter the critical section.
    Request,
    /// Current holder relinquishes the critical section.
    Release,
    /// Liveness ping; refreshes the session's last-seen time.
    Heartbeat,
    /// Deliver a payload to the shared resource (holder only).
    Write,
    /// Coordinator to client: you are now the holder.
    Grant,
}

/// One framed record.
///
/// `timestamp` is the sender's Lamport clock at send time. `content` is
/// free-form and only meaningful for `Write`; it defaults to empty when a
/// peer omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub node_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub content: String,
}

impl Message {
    fn new(kind: MessageKind, node_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind,
            node_id: node_id.into(),
            timestamp,
            content: String::new(),
        }
    }

    pub fn join(node_id: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageKind::Join, node_id, timestamp)
    }

    pub fn request(node_id: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageKind::Request, node_id, timestamp)
    }

    pub fn release(node_id: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageKind::Release, node_id, timestamp)
    }

    pub fn heartbeat(node_id: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageKind::Heartbeat, node_id, timestamp)
    }

    pub fn write(node_id: impl Into<String>, timestamp: i64, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(MessageKind::Write, node_id, timestamp)
        }
    }

    pub fn grant(timestamp: i64) -> Self {
        Self {
            content: "access granted".to_string(),
            ..Self::new(MessageKind::Grant, COORDINATOR_ID, timestamp)
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing: one JSON record per LF-terminated line.
//!
//! Receivers read a line at a time and decode it. A malformed line is a
//! recoverable error (the caller logs and skips it); only transport-level
//! failures end a session.

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::message::Message;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty line")]
    EmptyLine,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when the error is a bad record rather than a dead transport;
    /// the connection survives these.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::EmptyLine)
    }
}

/// Encode a message as a single LF-terminated line.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut data = serde_json::to_vec(message)?;
    data.push(b'\n');
    Ok(data)
}

/// Decode one line into a message. Trailing line terminators are ignored.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    let record = line.trim_end_matches(['\r', '\n']).trim();
    if record.is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    Ok(serde_json::from_str(record)?)
}

/// Encode and write one framed message, flushing so the peer sees it
/// without waiting for more traffic.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let data = encode(message)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

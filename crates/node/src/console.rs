// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive command loop for the node binary.

use std::fmt::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::{ClientError, NodeClient, NodeStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Request,
    Write(String),
    Release,
    Status,
    Quit,
}

/// Parse one console line. `Ok(None)` is a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    match command {
        "request" => Ok(Some(Command::Request)),
        "write" => {
            if rest.is_empty() {
                Err("usage: write <text>".to_string())
            } else {
                Ok(Some(Command::Write(rest.to_string())))
            }
        }
        "release" => Ok(Some(Command::Release)),
        "status" => Ok(Some(Command::Status)),
        "quit" => Ok(Some(Command::Quit)),
        other => Err(format!(
            "unknown command: {} (try request | write <text> | release | status | quit)",
            other
        )),
    }
}

pub fn render_status(status: &NodeStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "node {}", status.node_id);
    let _ = writeln!(out, "logical clock: {}", status.clock);
    let _ = writeln!(out, "connected: {}", status.connected);
    let _ = writeln!(out, "state: {}", status.phase);
    out
}

/// Run the command loop until `quit` or stdin closes.
pub async fn run(client: NodeClient) {
    println!("commands: request | write <text> | release | status | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Request)) => report(client.request_access(), "access requested"),
                Ok(Some(Command::Write(text))) => report(client.write(&text), "write sent"),
                Ok(Some(Command::Release)) => report(client.release(), "released"),
                Ok(Some(Command::Status)) => print!("{}", render_status(&client.status())),
                Ok(Some(Command::Quit)) => break,
                Err(usage) => println!("{}", usage),
            },
            Ok(None) => break,
            Err(e) => {
                eprintln!("console read error: {}", e);
                break;
            }
        }
    }
}

fn report(result: Result<(), ClientError>, ok: &str) {
    match result {
        Ok(()) => println!("{}", ok),
        Err(ClientError::Guard(guard)) => println!("warning: {}", guard),
        Err(e) => eprintln!("error: {}", e),
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator console: line-oriented commands against read-mode snapshots of
//! the arbiter. Owns stdout; the tracing layer writes to stderr.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::arbiter::{Arbiter, StatusSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Log,
    File,
    Quit,
}

/// Parse one console line. `Ok(None)` is a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    match line.trim() {
        "" => Ok(None),
        "status" => Ok(Some(Command::Status)),
        "log" => Ok(Some(Command::Log)),
        "file" => Ok(Some(Command::File)),
        "quit" => Ok(Some(Command::Quit)),
        other => Err(format!("unknown command: {} (try status | log | file | quit)", other)),
    }
}

pub fn render_status(status: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "logical clock: {}", status.clock);
    let _ = writeln!(out, "holder: {}", status.holder.as_deref().unwrap_or("(none)"));

    let _ = writeln!(out, "clients ({}):", status.clients.len());
    for client in &status.clients {
        let flag = if client.in_critical {
            "in critical section"
        } else {
            "idle"
        };
        let _ = writeln!(
            out,
            "  {}  {}  (last seen {}s ago)",
            client.node_id,
            flag,
            client.idle_for.as_secs()
        );
    }

    let _ = writeln!(out, "queue ({}):", status.queue.len());
    for (i, entry) in status.queue.iter().enumerate() {
        let _ = writeln!(out, "  {}. {} (timestamp {})", i + 1, entry.node_id, entry.lamport_ts);
    }
    out
}

pub fn render_log(entries: &[String]) -> String {
    if entries.is_empty() {
        return "(no entries)\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}", entry);
    }
    out
}

/// Run the console until `quit` or stdin closes.
pub async fn run(arbiter: Arc<Arbiter>) {
    println!("commands: status | log | file | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Status)) => print!("{}", render_status(&arbiter.status())),
                Ok(Some(Command::Log)) => print!("{}", render_log(&arbiter.access_log())),
                Ok(Some(Command::File)) => match arbiter.resource_contents() {
                    Ok(contents) if contents.is_empty() => println!("(empty file)"),
                    Ok(contents) => print!("{}", contents),
                    Err(e) => eprintln!("error reading shared resource: {}", e),
                },
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

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;

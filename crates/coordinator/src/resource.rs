// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared resource: an append-only text file owned by the coordinator.
//!
//! Nodes never touch the file directly; holder-gated WRITE messages are the
//! only mutation path. Each append is stamped with wall-clock time for human
//! auditing, deliberately decoupled from Lamport ordering.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Append-only byte sink backing the critical section.
#[derive(Debug)]
pub struct SharedResource {
    file: File,
    path: PathBuf,
}

impl SharedResource {
    /// Create the backing file, truncating any previous contents.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one stamped line and flush it to disk. Returns the wall-clock
    /// stamp used, for the access log.
    pub fn append(&mut self, node_id: &str, content: &str) -> io::Result<String> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        writeln!(self.file, "[{}] {}: {}", stamp, node_id, content)?;
        self.file.sync_data()?;
        Ok(stamp)
    }

    /// Current contents of the backing file.
    pub fn contents(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;

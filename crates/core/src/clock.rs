// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lamport logical clock.
//!
//! Every party (coordinator and each node) owns an independent clock. The
//! counter never decreases: receiving a message merges the sender's stamp
//! with `max(local, received) + 1`, and originating an event advances the
//! counter by one.

use std::sync::atomic::{AtomicI64, Ordering};

/// A monotonic logical clock over a signed 64-bit counter.
///
/// Lock-free so a reader task, a heartbeat ticker, and a command loop can
/// share one clock without a mutex.
#[derive(Debug, Default)]
pub struct LamportClock {
    time: AtomicI64,
}

impl LamportClock {
    /// Create a clock starting at 0.
    pub fn new() -> Self {
        Self {
            time: AtomicI64::new(0),
        }
    }

    /// Current counter value, without advancing it.
    pub fn time(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }

    /// Advance for a locally-originated event (send, grant) and return the
    /// new value.
    pub fn tick(&self) -> i64 {
        self.time.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Merge a received timestamp: the clock becomes
    /// `max(local, received) + 1`. Returns the new value.
    pub fn observe(&self, received: i64) -> i64 {
        let mut current = self.time.load(Ordering::SeqCst);
        loop {
            let next = current.max(received) + 1;
            match self
                .time
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

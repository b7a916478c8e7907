// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat-based failure detector.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::arbiter::Arbiter;

/// Detector timing. Nodes heartbeat every 3 s, so the default 10 s cutoff
/// gives better than 3x margin.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// How often the detector sweeps.
    pub scan_period: Duration,
    /// Silence longer than this marks a session dead.
    pub idle_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_period: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Sweep forever at the configured period.
pub async fn run(arbiter: Arc<Arbiter>, config: MonitorConfig) {
    let mut ticker = tokio::time::interval(config.scan_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep(&arbiter, config.idle_timeout);
    }
}

/// One detector pass. Expired ids are collected under the read lock and
/// removed afterwards, one write-mode removal each. Returns the removed
/// ids.
pub fn sweep(arbiter: &Arbiter, idle_timeout: Duration) -> Vec<String> {
    let expired = arbiter.expired_sessions(idle_timeout);
    for node_id in &expired {
        warn!(node_id = %node_id, "no traffic within idle timeout, removing session");
        arbiter.remove_session(node_id, None);
    }
    expired
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The node-side mutual-exclusion state machine, kept pure so the
//! networking client can wrap it and tests can drive it directly.

use thiserror::Error;

/// Where the node stands with respect to the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    Holding,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Requesting => "requesting",
            Phase::Holding => "holding",
        })
    }
}

/// Guard violations, surfaced to the operator as warnings; the offending
/// command is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("a request is already pending or you are in the critical section")]
    AlreadyRequested,

    #[error("not in the critical section")]
    NotHolding,
}

#[derive(Debug, Default)]
pub struct Machine {
    phase: Phase,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Idle -> Requesting. Double requests are refused.
    pub fn request(&mut self) -> Result<(), GuardError> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Requesting;
                Ok(())
            }
            Phase::Requesting | Phase::Holding => Err(GuardError::AlreadyRequested),
        }
    }

    /// Requesting -> Holding on GRANT. Returns false for a grant we never
    /// asked for; the phase is left unchanged.
    pub fn grant(&mut self) -> bool {
        if self.phase == Phase::Requesting {
            self.phase = Phase::Holding;
            true
        } else {
            false
        }
    }

    /// Writing requires holding the section.
    pub fn check_write(&self) -> Result<(), GuardError> {
        if self.phase == Phase::Holding {
            Ok(())
        } else {
            Err(GuardError::NotHolding)
        }
    }

    /// Holding -> Idle.
    pub fn release(&mut self) -> Result<(), GuardError> {
        if self.phase == Phase::Holding {
            self.phase = Phase::Idle;
            Ok(())
        } else {
            Err(GuardError::NotHolding)
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

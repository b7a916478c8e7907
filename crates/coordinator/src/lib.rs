// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mx-coordinator: the central arbiter for the mx lock service.
//!
//! Library target so integration tests can start a real listener
//! in-process; the `mxd` binary wires these modules to the command line.

pub mod access_log;
pub mod arbiter;
pub mod console;
pub mod lifecycle;
pub mod monitor;
pub mod resource;
pub mod server;

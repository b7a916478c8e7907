// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mx-core: wire protocol and logical clock shared by the coordinator
//! (`mxd`) and node (`mxn`) binaries.

pub mod clock;
pub mod message;
pub mod protocol;

pub use clock::LamportClock;
pub use message::{Message, MessageKind, COORDINATOR_ID};
pub use protocol::ProtocolError;

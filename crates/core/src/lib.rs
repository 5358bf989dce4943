// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mk-core: protocol core for the Maekawa quorum mutex
//!
//! This crate provides:
//! - Node ids and protocol messages
//! - Lamport clocks and a testable wall-time source
//! - Quorum (request set) resolution policies
//! - The pure, effect-producing mutex state machine
//! - Newline-delimited JSON framing for the wire

pub mod clock;
pub mod codec;
pub mod id;
pub mod liveness;
pub mod message;
pub mod node;
pub mod quorum;
pub mod time;

// Re-exports
pub use clock::LamportClock;
pub use codec::{decode, encode, CodecError, Deframer, MAX_FRAME_LEN};
pub use id::NodeId;
pub use liveness::LivenessMonitor;
pub use message::{Message, MessageKind};
pub use node::{Effect, MutexNode, NodeError, NodeEvent, NodeInput, NodeStats, ProcState};
pub use quorum::{check_intersection, QuorumError, QuorumPolicy, RequestSet};
pub use time::{FakeTime, SystemTime, TimeSource};

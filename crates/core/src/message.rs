// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages exchanged between nodes

use crate::id::NodeId;
use serde::{Deserialize, Serialize};

/// Message type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ask a quorum member for its vote
    Request,
    /// A quorum member's vote for the requester
    Grant,
    /// Return a vote after leaving (or abandoning) the critical section
    Release,
    /// Protocol-irrelevant chatter
    #[serde(alias = "greetings")]
    Greeting,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Grant => "grant",
            MessageKind::Release => "release",
            MessageKind::Greeting => "greeting",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single addressed protocol message.
///
/// `ts` is zero until the sending node stamps it at dispatch time. Every copy
/// of a multicast carries the same `ts` and differs only in `dest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msg_type")]
    pub kind: MessageKind,
    pub src: NodeId,
    pub dest: NodeId,
    pub ts: u64,
    #[serde(default)]
    pub data: String,
}

impl Message {
    pub fn new(kind: MessageKind, src: NodeId, dest: NodeId, data: impl Into<String>) -> Self {
        Self {
            kind,
            src,
            dest,
            ts: 0,
            data: data.into(),
        }
    }

    pub fn request(src: NodeId, dest: NodeId) -> Self {
        Self::new(MessageKind::Request, src, dest, src.to_string())
    }

    pub fn grant(src: NodeId, dest: NodeId) -> Self {
        Self::new(MessageKind::Grant, src, dest, src.to_string())
    }

    pub fn release(src: NodeId, dest: NodeId) -> Self {
        Self::new(MessageKind::Release, src, dest, src.to_string())
    }

    pub fn greeting(src: NodeId, dest: NodeId, payload: impl Into<String>) -> Self {
        Self::new(MessageKind::Greeting, src, dest, payload)
    }

    /// Set the dispatch timestamp
    pub fn stamped(mut self, ts: u64) -> Self {
        self.ts = ts;
        self
    }

    /// Copy of this message for another destination, keeping the timestamp
    pub fn addressed_to(&self, dest: NodeId) -> Self {
        Self {
            dest,
            ..self.clone()
        }
    }
}

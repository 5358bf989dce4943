// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Transport, TransportError};
use async_trait::async_trait;
use mk_core::{Message, NodeId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    sent: Vec<Message>,
    closed: HashSet<NodeId>,
}

/// Transport that records every message instead of sending it
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, in send order
    pub fn sent(&self) -> Vec<Message> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sent
            .clone()
    }

    /// Recorded messages addressed to `dest`
    pub fn sent_to(&self, dest: NodeId) -> Vec<Message> {
        self.sent().into_iter().filter(|m| m.dest == dest).collect()
    }

    /// Forget recorded messages
    pub fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sent
            .clear();
    }

    /// Make sends to `dest` fail as if its connection broke
    pub fn close(&self, dest: NodeId) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .closed
            .insert(dest);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed.contains(&message.dest) {
            return Err(TransportError::Closed(message.dest));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

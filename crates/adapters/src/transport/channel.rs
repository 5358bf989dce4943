// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory connection fabric
//!
//! Every registered node gets a [`ChannelTransport`] that delivers straight
//! into the other nodes' inboxes. A partitioned node neither sends nor
//! receives anything except messages to itself; the network silently drops
//! the rest, like a peer that never replies.

use super::{Transport, TransportError};
use async_trait::async_trait;
use mk_core::{Message, NodeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct NetworkState {
    inboxes: HashMap<NodeId, mpsc::Sender<Message>>,
    partitioned: HashSet<NodeId>,
    dropped: u64,
}

/// Shared in-memory network
#[derive(Clone, Default)]
pub struct ChannelNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node's inbox and return its transport
    pub fn register(&self, node: NodeId, inbox: mpsc::Sender<Message>) -> ChannelTransport {
        self.lock().inboxes.insert(node, inbox);
        ChannelTransport {
            local: node,
            network: self.clone(),
        }
    }

    /// Cut a node off from every other node
    pub fn partition(&self, node: NodeId) {
        self.lock().partitioned.insert(node);
    }

    pub fn heal(&self, node: NodeId) {
        self.lock().partitioned.remove(&node);
    }

    pub fn is_partitioned(&self, node: NodeId) -> bool {
        self.lock().partitioned.contains(&node)
    }

    /// Messages dropped because of a partition
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Route a message, or `None` if the partition swallowed it
    fn route(&self, message: &Message) -> Result<Option<mpsc::Sender<Message>>, TransportError> {
        let mut state = self.lock();
        let inbox = state
            .inboxes
            .get(&message.dest)
            .cloned()
            .ok_or(TransportError::UnknownPeer(message.dest))?;

        let cut = message.src != message.dest
            && (state.partitioned.contains(&message.src)
                || state.partitioned.contains(&message.dest));
        if cut {
            state.dropped += 1;
            return Ok(None);
        }
        Ok(Some(inbox))
    }
}

/// One node's handle on a [`ChannelNetwork`]
#[derive(Clone)]
pub struct ChannelTransport {
    local: NodeId,
    network: ChannelNetwork,
}

impl ChannelTransport {
    pub fn local(&self) -> NodeId {
        self.local
    }

    pub fn network(&self) -> &ChannelNetwork {
        &self.network
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let Some(inbox) = self.network.route(message)? else {
            tracing::trace!(
                node = %self.local,
                peer = %message.dest,
                kind = %message.kind,
                "dropped by partition"
            );
            return Ok(());
        };
        inbox
            .send(message.clone())
            .await
            .map_err(|_| TransportError::Closed(message.dest))
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;

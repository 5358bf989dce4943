// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message transports between nodes

mod channel;
mod tcp;

pub use channel::{ChannelNetwork, ChannelTransport};
pub use tcp::{bind_listener, spawn_listener, TcpTransport};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTransport;

use async_trait::async_trait;
use mk_core::{CodecError, Message, NodeId};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to node {node} at {addr} after {attempts} attempts: {source}")]
    ConnectFailed {
        node: NodeId,
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("no route to node {0}")]
    UnknownPeer(NodeId),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("connection to node {0} is closed")]
    Closed(NodeId),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound side of the connection fabric.
///
/// Messages arrive already stamped by the sending node; a transport only
/// routes and serializes them.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Deliver a message to `message.dest`
    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Deliver copies of one message to several nodes, keeping its timestamp
    async fn multicast(&self, dests: &[NodeId], message: &Message) -> Result<(), TransportError> {
        for dest in dests {
            self.send(&message.addressed_to(*dest)).await?;
        }
        Ok(())
    }
}

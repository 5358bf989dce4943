// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP transport: newline-delimited JSON over one connection per peer

use super::{Transport, TransportError};
use async_trait::async_trait;
use mk_core::{encode, Deframer, Message, NodeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};

const READ_BUF_LEN: usize = 4096;

type Writer = Arc<Mutex<TcpStream>>;

/// Outbound TCP connections from one node to every node in the cluster
#[derive(Clone)]
pub struct TcpTransport {
    local: NodeId,
    peers: Arc<HashMap<NodeId, SocketAddr>>,
    writers: Arc<RwLock<HashMap<NodeId, Writer>>>,
}

impl TcpTransport {
    /// Transport for `local` with the listen address of every node, itself included
    pub fn new(local: NodeId, peers: HashMap<NodeId, SocketAddr>) -> Self {
        Self {
            local,
            peers: Arc::new(peers),
            writers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    /// Open one connection per peer.
    ///
    /// Peers start concurrently, so each connect is retried up to `retries`
    /// times with a fixed `backoff`. Any peer that stays unreachable fails
    /// the whole call.
    pub async fn connect_all(&self, retries: u32, backoff: Duration) -> Result<(), TransportError> {
        let mut peers: Vec<(NodeId, SocketAddr)> =
            self.peers.iter().map(|(id, addr)| (*id, *addr)).collect();
        peers.sort();

        for (node, addr) in peers {
            let stream = connect_with_retry(node, addr, retries, backoff).await?;
            stream.set_nodelay(true)?;
            self.writers
                .write()
                .await
                .insert(node, Arc::new(Mutex::new(stream)));
            tracing::debug!(node = %self.local, peer = %node, %addr, "connected");
        }
        Ok(())
    }

    /// Number of open outbound connections
    pub async fn connected(&self) -> usize {
        self.writers.read().await.len()
    }
}

async fn connect_with_retry(
    node: NodeId,
    addr: SocketAddr,
    retries: u32,
    backoff: Duration,
) -> Result<TcpStream, TransportError> {
    let attempts = retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(source) if attempt >= attempts => {
                return Err(TransportError::ConnectFailed {
                    node,
                    addr,
                    attempts,
                    source,
                })
            }
            Err(e) => {
                tracing::trace!(peer = %node, %addr, attempt, error = %e, "connect retry");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let dest = message.dest;
        let writer = self.writers.read().await.get(&dest).cloned();
        let writer = match writer {
            Some(w) => w,
            None if self.peers.contains_key(&dest) => return Err(TransportError::Closed(dest)),
            None => return Err(TransportError::UnknownPeer(dest)),
        };

        let bytes = encode(message)?;
        let result = writer.lock().await.write_all(&bytes).await;
        if let Err(e) = result {
            // Broken connections are dropped for good; no reconnection
            self.writers.write().await.remove(&dest);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Bind a listener, reporting the address on failure
pub async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })
}

/// Accept connections and pump decoded messages into `inbox`.
///
/// Every accepted connection gets its own reader task. Aborting the returned
/// handle drops the listener and every reader with it.
pub fn spawn_listener(
    listener: TcpListener,
    local: NodeId,
    inbox: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut readers = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(node = %local, %peer, "accepted connection");
                        readers.spawn(read_connection(stream, peer, local, inbox.clone()));
                    }
                    Err(e) => tracing::warn!(node = %local, error = %e, "accept failed"),
                },
                Some(_) = readers.join_next(), if !readers.is_empty() => {}
            }
        }
    })
}

async fn read_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    local: NodeId,
    inbox: mpsc::Sender<Message>,
) {
    let mut deframer = Deframer::new();
    let mut buf = [0u8; READ_BUF_LEN];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(node = %local, %peer, "connection closed");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(node = %local, %peer, error = %e, "connection broken");
                return;
            }
        };

        for record in deframer.decode_read(&buf[..n]) {
            match record {
                Ok(message) => {
                    if inbox.send(message).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(node = %local, %peer, error = %e, "discarding malformed record")
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tests;

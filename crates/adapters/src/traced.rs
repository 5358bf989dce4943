// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced transport wrapper for consistent observability

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use mk_core::{Message, NodeId};
use tracing::Instrument;

/// Wrapper that adds tracing to any Transport
#[derive(Clone)]
pub struct TracedTransport<T> {
    inner: T,
}

impl<T> TracedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for TracedTransport<T> {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let span = tracing::debug_span!(
            "transport.send",
            node = %message.src,
            peer = %message.dest,
            kind = %message.kind,
            ts = message.ts,
        );

        async {
            let start = std::time::Instant::now();
            let result = self.inner.send(message).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "sent"),
                // A closed peer is expected once it has finished and gone away
                Err(TransportError::Closed(_)) => {
                    tracing::warn!(elapsed_ms, "peer connection closed")
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "send failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn multicast(&self, dests: &[NodeId], message: &Message) -> Result<(), TransportError> {
        let span = tracing::debug_span!(
            "transport.multicast",
            node = %message.src,
            kind = %message.kind,
            ts = message.ts,
            count = dests.len(),
        );

        async {
            for dest in dests {
                self.send(&message.addressed_to(*dest)).await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;

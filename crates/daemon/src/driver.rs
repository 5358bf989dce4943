// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol driver: the per-node loop that enters the critical section

use crate::barrier::FinishBarrier;
use crate::runtime::{AcquireOutcome, NodeHandle, RuntimeError};
use async_trait::async_trait;
use mk_core::NodeId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lower bound on the retry pause range after an abort
const MIN_RETRY_JITTER: Duration = Duration::from_millis(50);

/// Work done while holding the lock
#[async_trait]
pub trait CriticalSection: Send + Sync + 'static {
    async fn enter(&self, node: &NodeHandle, round: u32) -> Result<(), RuntimeError>;
}

/// Greets the request set, then holds the lock for a while
#[derive(Clone, Copy, Debug, Default)]
pub struct GreetingWork {
    hold_for: Duration,
}

impl GreetingWork {
    pub fn new(hold_for: Duration) -> Self {
        Self { hold_for }
    }
}

#[async_trait]
impl CriticalSection for GreetingWork {
    async fn enter(&self, node: &NodeHandle, round: u32) -> Result<(), RuntimeError> {
        node.greet(format!("Hola, this is Node_{}", node.id())).await?;
        debug!(
            node = %node.id(),
            round,
            hold_ms = self.hold_for.as_millis() as u64,
            "in critical section"
        );
        if !self.hold_for.is_zero() {
            tokio::time::sleep(self.hold_for).await;
        }
        Ok(())
    }
}

/// Driver loop settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    pub rounds: u32,
    pub start_jitter: Duration,
    pub hold_for: Duration,
}

/// What one driver did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverReport {
    pub node: NodeId,
    pub acquisitions: u32,
    pub aborted_attempts: u32,
}

/// Run `rounds` critical sections, then wait at the barrier.
///
/// Aborted attempts are retried after a fresh random pause. The driver
/// arrives at the barrier even when a round fails so the other drivers are
/// never left waiting on it.
pub async fn run_driver(
    node: NodeHandle,
    config: DriverConfig,
    work: Arc<dyn CriticalSection>,
    barrier: FinishBarrier,
) -> Result<DriverReport, RuntimeError> {
    let result = run_rounds(&node, config, work.as_ref()).await;

    let left = barrier.arrive();
    debug!(node = %node.id(), waiting_on = left, "driver finished");
    barrier.wait().await;
    result
}

async fn run_rounds(
    node: &NodeHandle,
    config: DriverConfig,
    work: &dyn CriticalSection,
) -> Result<DriverReport, RuntimeError> {
    let mut report = DriverReport {
        node: node.id(),
        acquisitions: 0,
        aborted_attempts: 0,
    };

    for round in 0..config.rounds {
        tokio::time::sleep(jitter(config.start_jitter)).await;

        loop {
            match node.acquire().await? {
                AcquireOutcome::Acquired { ts } => {
                    debug!(node = %node.id(), round, ts, "entered");
                    break;
                }
                AcquireOutcome::Aborted { returned } => {
                    report.aborted_attempts += 1;
                    warn!(node = %node.id(), round, returned = returned.len(), "retrying acquire");
                    tokio::time::sleep(retry_pause(config.start_jitter)).await;
                }
            }
        }

        let entered = work.enter(node, round).await;
        node.release().await?;
        entered?;
        report.acquisitions += 1;
    }

    info!(
        node = %report.node,
        acquisitions = report.acquisitions,
        aborted = report.aborted_attempts,
        "all rounds done"
    );
    Ok(report)
}

/// Pause before retrying an aborted attempt, drawn from at least
/// `[0, MIN_RETRY_JITTER]` even when `start_jitter` is zero
fn retry_pause(start_jitter: Duration) -> Duration {
    jitter(start_jitter.max(MIN_RETRY_JITTER))
}

/// Uniform pause in `[0, max]`, at millisecond granularity
fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;

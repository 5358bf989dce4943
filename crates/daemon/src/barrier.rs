// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide finish barrier
//!
//! Created once per process with the number of local drivers and shared by
//! handle. Each driver arrives when its loop ends; `wait` returns once the
//! count reaches zero. Arrivals past zero are ignored.

use std::sync::Arc;
use tokio::sync::watch;

/// Countdown shared by every driver in the process
#[derive(Clone, Debug)]
pub struct FinishBarrier {
    remaining: Arc<watch::Sender<usize>>,
}

impl FinishBarrier {
    pub fn new(parties: usize) -> Self {
        let (tx, _rx) = watch::channel(parties);
        Self {
            remaining: Arc::new(tx),
        }
    }

    /// Drivers that have not arrived yet
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Mark one driver finished; returns how many are still running
    pub fn arrive(&self) -> usize {
        let mut left = 0;
        self.remaining.send_modify(|remaining| {
            *remaining = remaining.saturating_sub(1);
            left = *remaining;
        });
        left
    }

    /// Wait until every driver has arrived
    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|remaining| *remaining == 0).await;
    }

    pub async fn arrive_and_wait(&self) {
        self.arrive();
        self.wait().await;
    }
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;

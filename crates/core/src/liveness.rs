// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inactivity detector used as the deadlock signal
//!
//! A node that is waiting for grants and hears nothing from anyone for a full
//! timeout window assumes a cyclic wait (or a dead peer) and aborts its
//! attempt. This is a local heuristic, not distributed deadlock detection.

use std::time::{Duration, Instant};

/// Tracks the last inbound activity and reports stalls
#[derive(Clone, Copy, Debug)]
pub struct LivenessMonitor {
    timeout: Duration,
    last_activity: Instant,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_activity: now,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the window
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Instant at which the current window expires
    pub fn deadline(&self) -> Instant {
        self.last_activity + self.timeout
    }

    /// True once a full window has passed without activity
    pub fn is_stalled(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= self.timeout
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-time source for liveness timeouts

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Provides the current instant; lets timeout logic run under test control
pub trait TimeSource: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Real monotonic time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced time for tests; clones share the same instant
#[derive(Clone, Debug)]
pub struct FakeTime {
    current: Arc<Mutex<Instant>>,
}

impl FakeTime {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Default for FakeTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for FakeTime {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

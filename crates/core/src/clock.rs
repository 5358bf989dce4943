// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lamport logical clock for causal ordering

/// Monotonic logical counter.
///
/// Advanced once per send event and on every receive, so a message sent in
/// reaction to another always carries a strictly greater timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LamportClock {
    time: u64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at a specific time
    pub fn at(time: u64) -> Self {
        Self { time }
    }

    /// Current time without advancing
    pub fn now(&self) -> u64 {
        self.time
    }

    /// Advance for a local send event and return the new time
    pub fn tick(&mut self) -> u64 {
        self.time += 1;
        self.time
    }

    /// Merge a received timestamp: `max(local, remote) + 1`
    pub fn observe(&mut self, remote: u64) -> u64 {
        self.time = self.time.max(remote) + 1;
        self.time
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maekawa mutex state machine
//!
//! A node plays two roles at once. As a *requester* it cycles
//! Released → Wanted → Held → Released, collecting one grant from every
//! member of its request set before entering. As a *voter* it hands its
//! single vote to one requester at a time and queues the rest until the vote
//! comes back with a release.
//!
//! The machine is pure: [`MutexNode::transition`] consumes an input and
//! returns the next state plus the effects to perform. Outbound messages are
//! stamped with the Lamport clock as they are produced, one tick per send
//! event, so every copy of a multicast shares a timestamp.

use crate::clock::LamportClock;
use crate::id::NodeId;
use crate::message::{Message, MessageKind};
use crate::quorum::RequestSet;
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Requester-side state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcState {
    Released,
    Wanted,
    Held,
}

impl std::fmt::Display for ProcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcState::Released => "released",
            ProcState::Wanted => "wanted",
            ProcState::Held => "held",
        };
        f.write_str(name)
    }
}

/// Inputs that drive the state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeInput {
    /// Start an attempt to enter the critical section
    Acquire,
    /// Leave the critical section
    Release,
    /// A message delivered by the transport
    Receive(Message),
    /// The liveness detector gave up waiting for grants
    Timeout,
    /// Send a greeting to the request set
    Greet { payload: String },
}

impl NodeInput {
    pub fn name(&self) -> &'static str {
        match self {
            NodeInput::Acquire => "acquire",
            NodeInput::Release => "release",
            NodeInput::Receive(_) => "receive",
            NodeInput::Timeout => "timeout",
            NodeInput::Greet { .. } => "greet",
        }
    }
}

/// Side effects requested by a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Deliver a stamped message to `message.dest`
    Send(Message),
    /// Report something observable
    Emit(NodeEvent),
}

/// Observable protocol events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    AttemptStarted { ts: u64 },
    LockAcquired { ts: u64 },
    LockReleased { ts: u64 },
    /// Attempt abandoned; grants collected so far were handed back
    AttemptAborted { returned: Vec<NodeId> },
    GrantIssued { to: NodeId },
    RequestDeferred { from: NodeId, queued: usize },
    VoteFreed { from: NodeId },
    /// A grant for an abandoned attempt arrived late and was handed back
    StaleGrantReturned { from: NodeId },
}

/// Counters kept for logging and tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub acquisitions: u64,
    pub aborted_attempts: u64,
    pub grants_issued: u64,
    pub requests_deferred: u64,
}

/// Errors from invalid use of the state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("node {node}: {input} is invalid while {state}")]
    InvalidTransition {
        node: NodeId,
        state: ProcState,
        input: &'static str,
    },
    #[error("node {node}: received message addressed to node {dest}")]
    Misrouted { node: NodeId, dest: NodeId },
    #[error("node {node}: request set is empty")]
    EmptyRequestSet { node: NodeId },
}

/// Per-node protocol state
#[derive(Clone, Debug)]
pub struct MutexNode {
    id: NodeId,
    request_set: RequestSet,
    proc_state: ProcState,
    voted: bool,
    voted_for: Option<NodeId>,
    clock: LamportClock,
    deferred: VecDeque<NodeId>,
    grants: BTreeSet<NodeId>,
    deadlocked: bool,
    stats: NodeStats,
}

impl MutexNode {
    pub fn new(id: NodeId, request_set: RequestSet) -> Result<Self, NodeError> {
        if request_set.is_empty() {
            return Err(NodeError::EmptyRequestSet { node: id });
        }
        Ok(Self {
            id,
            request_set,
            proc_state: ProcState::Released,
            voted: false,
            voted_for: None,
            clock: LamportClock::new(),
            deferred: VecDeque::new(),
            grants: BTreeSet::new(),
            deadlocked: false,
            stats: NodeStats::default(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn request_set(&self) -> &RequestSet {
        &self.request_set
    }

    pub fn proc_state(&self) -> ProcState {
        self.proc_state
    }

    pub fn is_voted(&self) -> bool {
        self.voted
    }

    /// Requester currently holding this node's vote
    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn deferred(&self) -> &VecDeque<NodeId> {
        &self.deferred
    }

    pub fn grants(&self) -> &BTreeSet<NodeId> {
        &self.grants
    }

    pub fn is_deadlocked(&self) -> bool {
        self.deadlocked
    }

    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Pure state transition function
    pub fn transition(&self, input: NodeInput) -> Result<(MutexNode, Vec<Effect>), NodeError> {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match input {
            NodeInput::Acquire => next.start_attempt(&mut effects)?,
            NodeInput::Release => next.release(&mut effects)?,
            NodeInput::Receive(message) => next.receive(message, &mut effects)?,
            NodeInput::Timeout => next.abort_attempt(&mut effects),
            NodeInput::Greet { payload } => {
                let ts = next.clock.tick();
                for dest in self.request_set.iter() {
                    effects.push(Effect::Send(
                        Message::greeting(self.id, dest, payload.clone()).stamped(ts),
                    ));
                }
            }
        }

        Ok((next, effects))
    }

    fn invalid(&self, input: &'static str) -> NodeError {
        NodeError::InvalidTransition {
            node: self.id,
            state: self.proc_state,
            input,
        }
    }

    /// One send event addressed to several peers
    fn multicast<I>(&mut self, kind: MessageKind, dests: I, effects: &mut Vec<Effect>) -> u64
    where
        I: IntoIterator<Item = NodeId>,
    {
        let ts = self.clock.tick();
        for dest in dests {
            let message = Message::new(kind, self.id, dest, self.id.to_string()).stamped(ts);
            effects.push(Effect::Send(message));
        }
        ts
    }

    fn send(&mut self, kind: MessageKind, dest: NodeId, effects: &mut Vec<Effect>) {
        self.multicast(kind, [dest], effects);
    }

    fn start_attempt(&mut self, effects: &mut Vec<Effect>) -> Result<(), NodeError> {
        if self.proc_state != ProcState::Released {
            return Err(self.invalid("acquire"));
        }
        self.deadlocked = false;
        self.grants.clear();
        self.proc_state = ProcState::Wanted;

        let members: Vec<NodeId> = self.request_set.iter().collect();
        let ts = self.multicast(MessageKind::Request, members, effects);
        debug!(node = %self.id, ts, request_set = %self.request_set, "requesting lock");
        effects.push(Effect::Emit(NodeEvent::AttemptStarted { ts }));
        Ok(())
    }

    fn release(&mut self, effects: &mut Vec<Effect>) -> Result<(), NodeError> {
        if self.proc_state != ProcState::Held {
            return Err(self.invalid("release"));
        }
        self.proc_state = ProcState::Released;

        let members: Vec<NodeId> = self.request_set.iter().collect();
        let ts = self.multicast(MessageKind::Release, members, effects);
        effects.push(Effect::Emit(NodeEvent::LockReleased { ts }));

        // Requests deferred only because we were inside the section, when
        // this node is not part of its own request set
        if !self.voted {
            if let Some(next) = self.deferred.pop_front() {
                self.vote_for(next, effects);
            }
        }
        Ok(())
    }

    /// Give up on the current attempt.
    ///
    /// Grants collected for it go back to their voters so no vote is left
    /// stranded on an attempt that no longer exists. Votes this node cast for
    /// others are untouched.
    fn abort_attempt(&mut self, effects: &mut Vec<Effect>) {
        if self.proc_state != ProcState::Wanted {
            trace!(node = %self.id, state = %self.proc_state, "timeout ignored");
            return;
        }
        self.deadlocked = true;
        self.proc_state = ProcState::Released;
        self.deferred.clear();

        let returned: Vec<NodeId> = std::mem::take(&mut self.grants).into_iter().collect();
        if !returned.is_empty() {
            self.multicast(MessageKind::Release, returned.clone(), effects);
        }
        self.stats.aborted_attempts += 1;
        effects.push(Effect::Emit(NodeEvent::AttemptAborted { returned }));
    }

    fn receive(&mut self, message: Message, effects: &mut Vec<Effect>) -> Result<(), NodeError> {
        if message.dest != self.id {
            return Err(NodeError::Misrouted {
                node: self.id,
                dest: message.dest,
            });
        }
        self.clock.observe(message.ts);
        let from = message.src;

        match message.kind {
            MessageKind::Greeting => {
                trace!(node = %self.id, %from, data = %message.data, "greeting");
            }
            MessageKind::Request => self.on_request(from, effects),
            MessageKind::Grant => self.on_grant(from, effects),
            MessageKind::Release => self.on_release(from, effects),
        }
        Ok(())
    }

    fn on_request(&mut self, from: NodeId, effects: &mut Vec<Effect>) {
        if self.proc_state == ProcState::Held || self.voted {
            self.deferred.push_back(from);
            self.stats.requests_deferred += 1;
            effects.push(Effect::Emit(NodeEvent::RequestDeferred {
                from,
                queued: self.deferred.len(),
            }));
        } else {
            self.vote_for(from, effects);
        }
    }

    fn on_grant(&mut self, from: NodeId, effects: &mut Vec<Effect>) {
        if self.proc_state != ProcState::Wanted {
            // The vote was cast for an attempt we no longer run
            self.send(MessageKind::Release, from, effects);
            effects.push(Effect::Emit(NodeEvent::StaleGrantReturned { from }));
            return;
        }
        if !self.request_set.contains(from) {
            warn!(node = %self.id, %from, "grant from outside request set ignored");
            return;
        }

        self.grants.insert(from);
        if self.request_set.is_covered_by(&self.grants) {
            self.proc_state = ProcState::Held;
            self.stats.acquisitions += 1;
            effects.push(Effect::Emit(NodeEvent::LockAcquired {
                ts: self.clock.now(),
            }));
        }
    }

    fn on_release(&mut self, from: NodeId, effects: &mut Vec<Effect>) {
        if self.voted_for != Some(from) {
            debug!(node = %self.id, %from, voted_for = ?self.voted_for, "release from non-holder");
        }
        match self.deferred.pop_front() {
            Some(next) => self.vote_for(next, effects),
            None => {
                self.voted = false;
                self.voted_for = None;
                effects.push(Effect::Emit(NodeEvent::VoteFreed { from }));
            }
        }
    }

    fn vote_for(&mut self, requester: NodeId, effects: &mut Vec<Effect>) {
        self.send(MessageKind::Grant, requester, effects);
        self.voted = true;
        self.voted_for = Some(requester);
        self.stats.grants_issued += 1;
        effects.push(Effect::Emit(NodeEvent::GrantIssued { to: requester }));
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;

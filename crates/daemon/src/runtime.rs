// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node actor
//!
//! One task owns each node's state machine. Inbound messages, driver
//! commands, and liveness checks are all serialized through its select loop,
//! so nothing else ever touches protocol state. A pending `acquire` waits on
//! a oneshot reply while the actor keeps pumping inbound traffic; that is
//! what lets the grants it is waiting for get through.

use mk_adapters::Transport;
use mk_core::{
    Effect, LivenessMonitor, Message, MutexNode, NodeError, NodeEvent, NodeId, NodeInput,
    NodeStats, ProcState, TimeSource,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 32;

/// Errors from talking to a node actor
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("node {0} runtime has stopped")]
    Stopped(NodeId),
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Result of one acquire attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The node holds the lock
    Acquired { ts: u64 },
    /// The liveness detector fired; the node is released again
    Aborted { returned: Vec<NodeId> },
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired { .. })
    }
}

/// Point-in-time view of a node's protocol state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub state: ProcState,
    pub voted: bool,
    pub voted_for: Option<NodeId>,
    pub deferred: Vec<NodeId>,
    pub grants: Vec<NodeId>,
    pub deadlocked: bool,
    pub clock: u64,
    pub stats: NodeStats,
}

impl NodeSnapshot {
    fn of(node: &MutexNode) -> Self {
        Self {
            id: node.id(),
            state: node.proc_state(),
            voted: node.is_voted(),
            voted_for: node.voted_for(),
            deferred: node.deferred().iter().copied().collect(),
            grants: node.grants().iter().copied().collect(),
            deadlocked: node.is_deadlocked(),
            clock: node.clock(),
            stats: node.stats(),
        }
    }
}

type AcquireReply = oneshot::Sender<Result<AcquireOutcome, NodeError>>;

enum Command {
    Acquire { reply: AcquireReply },
    Release { reply: oneshot::Sender<Result<(), NodeError>> },
    Greet { payload: String },
    Snapshot { reply: oneshot::Sender<NodeSnapshot> },
    Shutdown,
}

/// Cloneable handle for driving a node actor
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    commands: mpsc::Sender<Command>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Request the lock and wait until it is held or the attempt aborts
    pub async fn acquire(&self) -> Result<AcquireOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Acquire { reply }).await?;
        let outcome = rx.await.map_err(|_| RuntimeError::Stopped(self.id))??;
        Ok(outcome)
    }

    pub async fn release(&self) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Release { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Stopped(self.id))??;
        Ok(())
    }

    /// Multicast a greeting to the node's request set
    pub async fn greet(&self, payload: impl Into<String>) -> Result<(), RuntimeError> {
        self.command(Command::Greet {
            payload: payload.into(),
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Stopped(self.id))
    }

    /// Stop the actor; a no-op if it already stopped
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn command(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::Stopped(self.id))
    }
}

/// Actor state for one node
struct NodeRuntime<T, C> {
    node: MutexNode,
    transport: T,
    time: C,
    liveness: LivenessMonitor,
    inbox: mpsc::Receiver<Message>,
    commands: mpsc::Receiver<Command>,
    pending_acquire: Option<AcquireReply>,
}

/// Start a node actor.
///
/// `inbox` carries every message addressed to this node, whatever transport
/// delivered it. The liveness check runs several times per timeout window.
pub fn spawn_node<T, C>(
    node: MutexNode,
    transport: T,
    inbox: mpsc::Receiver<Message>,
    time: C,
    liveness_timeout: Duration,
) -> (NodeHandle, JoinHandle<()>)
where
    T: Transport,
    C: TimeSource,
{
    let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
    let handle = NodeHandle {
        id: node.id(),
        commands: tx,
    };
    let runtime = NodeRuntime {
        liveness: LivenessMonitor::new(liveness_timeout, time.now()),
        node,
        transport,
        time,
        inbox,
        commands,
        pending_acquire: None,
    };
    let check_every = (liveness_timeout / 4).max(Duration::from_millis(1));
    let task = tokio::spawn(runtime.run(check_every));
    (handle, task)
}

impl<T, C> NodeRuntime<T, C>
where
    T: Transport,
    C: TimeSource,
{
    async fn run(mut self, check_every: Duration) {
        let id = self.node.id();
        let mut ticker = tokio::time::interval(check_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(node = %id, request_set = %self.node.request_set(), "node started");
        loop {
            tokio::select! {
                Some(message) = self.inbox.recv() => {
                    self.liveness.record_activity(self.time.now());
                    if let Err(e) = self.apply(NodeInput::Receive(message)).await {
                        warn!(node = %id, error = %e, "dropping message");
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                _ = ticker.tick() => self.check_liveness().await,
            }
        }

        let stats = self.node.stats();
        debug!(
            node = %id,
            acquisitions = stats.acquisitions,
            aborted = stats.aborted_attempts,
            grants_issued = stats.grants_issued,
            "node stopped"
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Acquire { reply } => {
                self.liveness.record_activity(self.time.now());
                match self.node.transition(NodeInput::Acquire) {
                    Ok((next, effects)) => {
                        self.node = next;
                        self.pending_acquire = Some(reply);
                        self.execute_all(effects).await;
                    }
                    Err(e) => {
                        error!(error = %e, "invalid acquire");
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::Release { reply } => {
                let result = self.apply(NodeInput::Release).await;
                if let Err(e) = &result {
                    error!(error = %e, "invalid release");
                }
                let _ = reply.send(result);
            }
            Command::Greet { payload } => {
                if let Err(e) = self.apply(NodeInput::Greet { payload }).await {
                    error!(error = %e, "greeting failed");
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(NodeSnapshot::of(&self.node));
            }
            Command::Shutdown => {}
        }
    }

    async fn check_liveness(&mut self) {
        if self.node.proc_state() != ProcState::Wanted {
            return;
        }
        if self.liveness.is_stalled(self.time.now()) {
            warn!(
                node = %self.node.id(),
                timeout_ms = self.liveness.timeout().as_millis() as u64,
                grants = self.node.grants().len(),
                needed = self.node.request_set().len(),
                "no progress while waiting for grants"
            );
            // Timeout is valid in every state
            let _ = self.apply(NodeInput::Timeout).await;
        }
    }

    async fn apply(&mut self, input: NodeInput) -> Result<(), NodeError> {
        let (next, effects) = self.node.transition(input)?;
        self.node = next;
        self.execute_all(effects).await;
        Ok(())
    }

    async fn execute_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(message) => self.send(message).await,
                Effect::Emit(event) => self.emit(event),
            }
        }
    }

    async fn send(&self, message: Message) {
        debug!(
            node = %message.src,
            peer = %message.dest,
            kind = %message.kind,
            ts = message.ts,
            "send"
        );
        // A lost message surfaces later as a liveness timeout
        if let Err(e) = self.transport.send(&message).await {
            warn!(node = %message.src, peer = %message.dest, error = %e, "send failed");
        }
    }

    fn emit(&mut self, event: NodeEvent) {
        let id = self.node.id();
        match event {
            NodeEvent::LockAcquired { ts } => {
                info!(node = %id, ts, "lock acquired");
                self.reply_acquire(AcquireOutcome::Acquired { ts });
            }
            NodeEvent::AttemptAborted { returned } => {
                warn!(node = %id, returned = ?returned, "acquire aborted");
                self.reply_acquire(AcquireOutcome::Aborted { returned });
            }
            NodeEvent::LockReleased { ts } => info!(node = %id, ts, "lock released"),
            NodeEvent::AttemptStarted { ts } => debug!(node = %id, ts, "attempt started"),
            NodeEvent::GrantIssued { to } => debug!(node = %id, peer = %to, "grant issued"),
            NodeEvent::RequestDeferred { from, queued } => {
                debug!(node = %id, peer = %from, queued, "request deferred")
            }
            NodeEvent::VoteFreed { from } => debug!(node = %id, peer = %from, "vote freed"),
            NodeEvent::StaleGrantReturned { from } => {
                debug!(node = %id, peer = %from, "stale grant returned")
            }
        }
    }

    fn reply_acquire(&mut self, outcome: AcquireOutcome) {
        if let Some(reply) = self.pending_acquire.take() {
            let _ = reply.send(Ok(outcome));
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;

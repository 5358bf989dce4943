// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster lifecycle management: startup, driving, shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mk_adapters::{
    bind_listener, spawn_listener, ChannelNetwork, TcpTransport, TracedTransport, TransportError,
};
use mk_core::{
    check_intersection, Message, MutexNode, NodeError, NodeId, QuorumError, RequestSet,
    SystemTime,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::barrier::FinishBarrier;
use crate::config::{ClusterConfig, ConfigError};
use crate::driver::{run_driver, CriticalSection, DriverReport, GreetingWork};
use crate::runtime::{spawn_node, NodeHandle, RuntimeError};

const INBOX_CAPACITY: usize = 1024;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Quorum error: {0}")]
    Quorum(#[from] QuorumError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a full cluster run
#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub drivers: Vec<DriverReport>,
    pub elapsed: Duration,
}

impl ClusterReport {
    pub fn total_acquisitions(&self) -> u64 {
        self.drivers.iter().map(|d| u64::from(d.acquisitions)).sum()
    }

    pub fn total_aborts(&self) -> u64 {
        self.drivers.iter().map(|d| u64::from(d.aborted_attempts)).sum()
    }
}

/// Refuse request sets that cannot guarantee mutual exclusion, unless the
/// config explicitly allows them
pub fn check_quorums(config: &ClusterConfig) -> Result<(), LifecycleError> {
    match check_intersection(config.policy, config.nodes) {
        Ok(()) => Ok(()),
        Err(e @ QuorumError::Disjoint { .. }) if config.allow_disjoint_quorums => {
            warn!(error = %e, "mutual exclusion is NOT guaranteed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn request_sets(config: &ClusterConfig) -> Result<Vec<RequestSet>, LifecycleError> {
    let sets = config
        .node_ids()
        .map(|id| config.policy.request_set_for(id, config.nodes))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sets)
}

/// Bind every node's configured listen address
pub async fn bind_listeners(config: &ClusterConfig) -> Result<Vec<TcpListener>, LifecycleError> {
    let mut listeners = Vec::new();
    for id in config.node_ids() {
        listeners.push(bind_listener(config.addr_of(id)).await?);
    }
    Ok(listeners)
}

/// Running node actors, one per configured node
pub struct Cluster {
    config: ClusterConfig,
    handles: Vec<NodeHandle>,
    nodes: Vec<JoinHandle<()>>,
    listeners: Vec<JoinHandle<()>>,
}

impl Cluster {
    /// Start a cluster over TCP on already-bound listeners (one per node, in id order)
    pub async fn start_tcp(
        config: &ClusterConfig,
        listeners: Vec<TcpListener>,
    ) -> Result<Self, LifecycleError> {
        check_quorums(config)?;
        let sets = request_sets(config)?;

        let mut addrs = HashMap::new();
        let mut inboxes = Vec::new();
        let mut listener_tasks = Vec::new();
        for (id, listener) in config.node_ids().zip(listeners) {
            addrs.insert(id, listener.local_addr()?);
            let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
            listener_tasks.push(spawn_listener(listener, id, tx));
            inboxes.push(rx);
        }

        match Self::connect_nodes(config, sets, addrs, inboxes).await {
            Ok((handles, nodes)) => {
                info!(nodes = config.nodes, policy = %config.policy, "cluster started over TCP");
                Ok(Self {
                    config: config.clone(),
                    handles,
                    nodes,
                    listeners: listener_tasks,
                })
            }
            Err(e) => {
                // Nothing is reachable without every connection; drop what started
                for task in &listener_tasks {
                    task.abort();
                }
                Err(e)
            }
        }
    }

    async fn connect_nodes(
        config: &ClusterConfig,
        sets: Vec<RequestSet>,
        addrs: HashMap<NodeId, SocketAddr>,
        inboxes: Vec<mpsc::Receiver<Message>>,
    ) -> Result<(Vec<NodeHandle>, Vec<JoinHandle<()>>), LifecycleError> {
        let mut transports = Vec::new();
        for id in config.node_ids() {
            let transport = TcpTransport::new(id, addrs.clone());
            transport
                .connect_all(config.connect_retries, config.connect_backoff)
                .await?;
            transports.push(TracedTransport::new(transport));
        }

        let mut handles = Vec::new();
        let mut nodes = Vec::new();
        for (((id, set), transport), inbox) in
            config.node_ids().zip(sets).zip(transports).zip(inboxes)
        {
            let node = MutexNode::new(id, set)?;
            let (handle, task) =
                spawn_node(node, transport, inbox, SystemTime, config.liveness_timeout);
            handles.push(handle);
            nodes.push(task);
        }
        Ok((handles, nodes))
    }

    /// Start a cluster whose nodes talk over in-memory channels
    pub fn start_in_memory(config: &ClusterConfig) -> Result<Self, LifecycleError> {
        check_quorums(config)?;
        let network = ChannelNetwork::new();

        let mut handles = Vec::new();
        let mut nodes = Vec::new();
        for (id, set) in config.node_ids().zip(request_sets(config)?) {
            let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
            let transport = TracedTransport::new(network.register(id, tx));
            let node = MutexNode::new(id, set)?;
            let (handle, task) =
                spawn_node(node, transport, rx, SystemTime, config.liveness_timeout);
            handles.push(handle);
            nodes.push(task);
        }

        info!(nodes = config.nodes, policy = %config.policy, "cluster started in memory");
        Ok(Self {
            config: config.clone(),
            handles,
            nodes,
            listeners: Vec::new(),
        })
    }

    pub fn handles(&self) -> &[NodeHandle] {
        &self.handles
    }

    /// Run every node's driver loop with the configured greeting work
    pub async fn run_drivers(&self) -> Result<Vec<DriverReport>, LifecycleError> {
        let work = Arc::new(GreetingWork::new(self.config.hold_for));
        self.run_drivers_with(work).await
    }

    /// Run every node's driver loop until all of them meet at the barrier
    pub async fn run_drivers_with(
        &self,
        work: Arc<dyn CriticalSection>,
    ) -> Result<Vec<DriverReport>, LifecycleError> {
        let barrier = FinishBarrier::new(self.handles.len());
        let driver_config = self.config.driver_config();
        let drivers: Vec<_> = self
            .handles
            .iter()
            .map(|handle| {
                tokio::spawn(run_driver(
                    handle.clone(),
                    driver_config,
                    Arc::clone(&work),
                    barrier.clone(),
                ))
            })
            .collect();

        let mut reports = Vec::new();
        for driver in drivers {
            reports.push(driver.await??);
        }
        Ok(reports)
    }

    /// Stop node actors, then listeners
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.shutdown().await;
        }
        for task in self.nodes {
            if let Err(e) = task.await {
                warn!(error = %e, "node task ended abnormally");
            }
        }
        for task in &self.listeners {
            task.abort();
        }
        info!("cluster stopped");
    }
}

/// Bind, start, drive, and stop a TCP cluster
pub async fn run(config: &ClusterConfig) -> Result<ClusterReport, LifecycleError> {
    config.validate()?;
    let listeners = bind_listeners(config).await?;
    let cluster = Cluster::start_tcp(config, listeners).await?;

    let start = Instant::now();
    let drivers = cluster.run_drivers().await;
    let elapsed = start.elapsed();
    cluster.shutdown().await;

    let report = ClusterReport {
        drivers: drivers?,
        elapsed,
    };
    info!(
        acquisitions = report.total_acquisitions(),
        aborts = report.total_aborts(),
        elapsed_ms = elapsed.as_millis() as u64,
        "run complete"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

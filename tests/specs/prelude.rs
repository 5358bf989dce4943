//! Shared helpers for cluster specs

#![allow(dead_code)]

pub use mk_core::{encode, Message, NodeId, ProcState, QuorumPolicy};
pub use mk_daemon::{
    AcquireOutcome, Cluster, ClusterConfig, CriticalSection, DriverReport, NodeHandle,
    RuntimeError,
};
pub use std::sync::Arc;
pub use std::time::Duration;

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpListener;

/// Small, fast cluster settings
pub fn config(nodes: u32, policy: QuorumPolicy, rounds: u32) -> ClusterConfig {
    ClusterConfig {
        nodes,
        policy,
        rounds,
        start_jitter: Duration::from_millis(3),
        hold_for: Duration::from_millis(1),
        liveness_timeout: Duration::from_secs(1),
        connect_retries: 20,
        connect_backoff: Duration::from_millis(20),
        ..ClusterConfig::default()
    }
}

/// Start a TCP cluster on ephemeral loopback ports
pub async fn start(config: &ClusterConfig) -> (Cluster, Vec<SocketAddr>) {
    let mut listeners = Vec::new();
    let mut addrs = Vec::new();
    for _ in 0..config.nodes {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addrs.push(listener.local_addr().unwrap());
        listeners.push(listener);
    }
    let cluster = Cluster::start_tcp(config, listeners).await.unwrap();
    (cluster, addrs)
}

/// Run every driver, failing if they do not all finish in time
pub async fn drive(cluster: &Cluster, work: Arc<dyn CriticalSection>) -> Vec<DriverReport> {
    tokio::time::timeout(Duration::from_secs(60), cluster.run_drivers_with(work))
        .await
        .expect("drivers did not finish")
        .unwrap()
}

/// Records the order in which nodes enter and leave
#[derive(Default)]
pub struct Ledger {
    entries: Mutex<Vec<(NodeId, bool)>>,
}

impl Ledger {
    /// `(node, entering)` pairs in the order they happened
    pub fn entries(&self) -> Vec<(NodeId, bool)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CriticalSection for Ledger {
    async fn enter(&self, node: &NodeHandle, _round: u32) -> Result<(), RuntimeError> {
        self.entries.lock().unwrap().push((node.id(), true));
        node.greet(format!("Hola, this is Node_{}", node.id())).await?;
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.entries.lock().unwrap().push((node.id(), false));
        Ok(())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) describes a three-node grid cluster on localhost.

use crate::driver::DriverConfig;
use mk_core::{NodeId, QuorumPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cluster needs at least one node")]
    NoNodes,
    #[error("{nodes} nodes starting at port {base_port} run past port 65535")]
    PortRange { base_port: u16, nodes: u32 },
    #[error("liveness timeout must be greater than zero")]
    ZeroTimeout,
}

/// Settings for an in-process cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Number of nodes; ids are `0..nodes`
    pub nodes: u32,
    pub host: IpAddr,
    /// Node `i` listens on `base_port + i`
    pub base_port: u16,
    pub policy: QuorumPolicy,
    /// Start even when some request sets do not intersect
    pub allow_disjoint_quorums: bool,
    #[serde(with = "humantime_serde")]
    pub liveness_timeout: Duration,
    /// Critical-section entries per node
    pub rounds: u32,
    /// Upper bound of the random pause before each round
    #[serde(with = "humantime_serde")]
    pub start_jitter: Duration,
    /// Time spent inside the critical section
    #[serde(with = "humantime_serde")]
    pub hold_for: Duration,
    pub connect_retries: u32,
    #[serde(with = "humantime_serde")]
    pub connect_backoff: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 7000,
            policy: QuorumPolicy::Grid,
            allow_disjoint_quorums: false,
            liveness_timeout: Duration::from_secs(2),
            rounds: 20,
            start_jitter: Duration::from_secs(1),
            hold_for: Duration::from_millis(10),
            connect_retries: 50,
            connect_backoff: Duration::from_millis(100),
            log_file: None,
        }
    }
}

impl ClusterConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if u64::from(self.base_port) + u64::from(self.nodes) - 1 > u64::from(u16::MAX) {
            return Err(ConfigError::PortRange {
                base_port: self.base_port,
                nodes: self.nodes,
            });
        }
        if self.liveness_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Listen address of a node
    pub fn addr_of(&self, node: NodeId) -> SocketAddr {
        let port =
            u16::try_from(u64::from(self.base_port) + u64::from(node.0)).unwrap_or(u16::MAX);
        SocketAddr::new(self.host, port)
    }

    /// Listen address of every node
    pub fn peer_addrs(&self) -> HashMap<NodeId, SocketAddr> {
        self.node_ids().map(|id| (id, self.addr_of(id))).collect()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes).map(NodeId)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            rounds: self.rounds,
            start_jitter: self.start_jitter,
            hold_for: self.hold_for,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

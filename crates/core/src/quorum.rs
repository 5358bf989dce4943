// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request set (quorum) resolution
//!
//! Mutual exclusion holds only if every two request sets share a member: that
//! member can vote for one requester at a time, so the two requests are forced
//! into an order. The state machine never checks this; the policy must
//! guarantee it, and [`check_intersection`] verifies it for a cluster size.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from quorum resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuorumError {
    #[error("cluster has no nodes")]
    EmptyCluster,
    #[error("node {node} is outside a cluster of {total} nodes")]
    UnknownNode { node: NodeId, total: u32 },
    #[error("{policy} request sets of nodes {a} and {b} are disjoint")]
    Disjoint {
        policy: QuorumPolicy,
        a: NodeId,
        b: NodeId,
    },
    #[error("unknown quorum policy: {0}")]
    UnknownPolicy(String),
}

/// How request sets are assigned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumPolicy {
    /// Row plus column of a ⌈√N⌉-wide grid; pairwise intersecting for any N
    #[default]
    Grid,
    /// Even ids form one clique, odd ids another; disjoint for N >= 2
    Parity,
    /// Every node asks every node
    All,
}

impl QuorumPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuorumPolicy::Grid => "grid",
            QuorumPolicy::Parity => "parity",
            QuorumPolicy::All => "all",
        }
    }

    /// Request set of `node` in a cluster of `total` nodes
    pub fn request_set_for(self, node: NodeId, total: u32) -> Result<RequestSet, QuorumError> {
        if total == 0 {
            return Err(QuorumError::EmptyCluster);
        }
        if node.0 >= total {
            return Err(QuorumError::UnknownNode { node, total });
        }

        let members = match self {
            QuorumPolicy::Grid => grid_members(node.0, total),
            QuorumPolicy::Parity => (node.0 % 2..total).step_by(2).map(NodeId).collect(),
            QuorumPolicy::All => (0..total).map(NodeId).collect(),
        };
        Ok(RequestSet(members))
    }
}

impl std::fmt::Display for QuorumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuorumPolicy {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(QuorumPolicy::Grid),
            "parity" => Ok(QuorumPolicy::Parity),
            "all" => Ok(QuorumPolicy::All),
            other => Err(QuorumError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Smallest k with k * k >= total
fn grid_width(total: u32) -> u32 {
    let mut k = 1;
    while k * k < total {
        k += 1;
    }
    k
}

fn grid_members(id: u32, total: u32) -> BTreeSet<NodeId> {
    let k = grid_width(total);
    let row = id / k;
    let col = id % k;

    let row_members = (row * k..(row * k + k).min(total)).map(NodeId);
    let col_members = (col..total).step_by(k as usize).map(NodeId);
    row_members.chain(col_members).collect()
}

/// Fixed set of peers whose grants a node needs before entering
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RequestSet(BTreeSet<NodeId>);

impl RequestSet {
    pub fn new(members: impl IntoIterator<Item = NodeId>) -> Self {
        Self(members.into_iter().collect())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.0.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    /// True when `grants` covers every member
    pub fn is_covered_by(&self, grants: &BTreeSet<NodeId>) -> bool {
        self.0.is_subset(grants)
    }

    pub fn intersects(&self, other: &RequestSet) -> bool {
        self.0.intersection(&other.0).next().is_some()
    }
}

impl FromIterator<NodeId> for RequestSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Display for RequestSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(", "))
    }
}

/// Verify every pair of request sets intersects; reports the first disjoint pair
pub fn check_intersection(policy: QuorumPolicy, total: u32) -> Result<(), QuorumError> {
    let sets = (0..total)
        .map(|id| policy.request_set_for(NodeId(id), total))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, a) in sets.iter().enumerate() {
        for (j, b) in sets.iter().enumerate().skip(i + 1) {
            if !a.intersects(b) {
                return Err(QuorumError::Disjoint {
                    policy,
                    a: NodeId(i as u32),
                    b: NodeId(j as u32),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "quorum_tests.rs"]
mod tests;

//! Behavioral specifications for a Maekawa cluster.
//!
//! These run whole clusters in-process over real loopback TCP and check
//! only what is observable from outside a node: who held the lock when,
//! what each node reports, and how nodes treat bytes on the wire.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cluster/
#[path = "specs/cluster/exclusion.rs"]
mod cluster_exclusion;
#[path = "specs/cluster/wire.rs"]
mod cluster_wire;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mk-daemon: runs a cluster of Maekawa mutual exclusion nodes

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod barrier;
pub mod config;
pub mod driver;
pub mod lifecycle;
pub mod logging;
pub mod runtime;

pub use barrier::FinishBarrier;
pub use config::{ClusterConfig, ConfigError};
pub use driver::{run_driver, CriticalSection, DriverConfig, DriverReport, GreetingWork};
pub use lifecycle::{bind_listeners, check_quorums, run, Cluster, ClusterReport, LifecycleError};
pub use logging::setup_logging;
pub use runtime::{spawn_node, AcquireOutcome, NodeHandle, NodeSnapshot, RuntimeError};

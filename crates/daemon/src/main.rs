// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maekawa mutual exclusion daemon (mkd)
//!
//! Starts every node of a cluster in this process, drives each through its
//! critical-section rounds over TCP, and prints a summary once all of them
//! meet at the finish barrier.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use mk_core::QuorumPolicy;
use mk_daemon::{lifecycle, setup_logging, ClusterConfig};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "mkd", version, about = "Run a Maekawa mutual exclusion cluster")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<u32>,

    /// Port of node 0; node i listens on base + i
    #[arg(long)]
    base_port: Option<u16>,

    /// Critical-section entries per node
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Request set construction: grid, parity or all
    #[arg(short, long)]
    policy: Option<QuorumPolicy>,

    /// Abort an attempt after this long without hearing from anyone (e.g. "2s")
    #[arg(long, value_parser = parse_duration)]
    liveness_timeout: Option<Duration>,

    /// Start even when request sets do not pairwise intersect
    #[arg(long)]
    allow_disjoint_quorums: bool,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ClusterConfig, mk_daemon::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClusterConfig::load(path)?,
            None => ClusterConfig::default(),
        };
        if let Some(nodes) = self.nodes {
            config.nodes = nodes;
        }
        if let Some(base_port) = self.base_port {
            config.base_port = base_port;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(timeout) = self.liveness_timeout {
            config.liveness_timeout = timeout;
        }
        if self.allow_disjoint_quorums {
            config.allow_disjoint_quorums = true;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mkd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config()?;
    let _log_guard = setup_logging(config.log_file.as_deref())?;

    info!(
        nodes = config.nodes,
        policy = %config.policy,
        rounds = config.rounds,
        base_port = config.base_port,
        "starting mkd"
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let report = tokio::select! {
        result = lifecycle::run(&config) => match result {
            Ok(report) => report,
            Err(e) => {
                error!("cluster run failed: {}", e);
                return Err(e.into());
            }
        },
        _ = sigterm.recv() => {
            info!("Received SIGTERM, stopping");
            return Ok(());
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, stopping");
            return Ok(());
        }
    };

    for driver in &report.drivers {
        println!(
            "node {}: {} acquisitions, {} aborted attempts",
            driver.node, driver.acquisitions, driver.aborted_attempts
        );
    }
    println!(
        "done: {} acquisitions across {} nodes in {:.2?}",
        report.total_acquisitions(),
        report.drivers.len(),
        report.elapsed
    );
    Ok(())
}

//! Mutual exclusion specs
//!
//! Every entry into the critical section must be followed by the same
//! node's exit before anyone else enters.

use crate::prelude::*;

fn assert_serialized(entries: &[(NodeId, bool)]) {
    let mut holder: Option<NodeId> = None;
    for &(node, entering) in entries {
        if entering {
            assert_eq!(holder, None, "{node} entered while {holder:?} was inside");
            holder = Some(node);
        } else {
            assert_eq!(holder, Some(node), "{node} left without holding");
            holder = None;
        }
    }
    assert_eq!(holder, None);
}

async fn run_cluster(nodes: u32, policy: QuorumPolicy, rounds: u32) {
    let config = config(nodes, policy, rounds);
    let (cluster, _) = start(&config).await;
    let ledger = Arc::new(Ledger::default());

    let reports = drive(&cluster, ledger.clone()).await;

    let entries = ledger.entries();
    assert_eq!(entries.len(), (2 * nodes * rounds) as usize);
    assert_serialized(&entries);
    for report in &reports {
        assert_eq!(report.acquisitions, rounds, "node {}", report.node);
    }
    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn grid_cluster_serializes_critical_sections() {
    run_cluster(4, QuorumPolicy::Grid, 4).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_policy_cluster_serializes_critical_sections() {
    run_cluster(3, QuorumPolicy::All, 3).await;
}

#[tokio::test]
async fn single_node_cluster_grants_itself() {
    run_cluster(1, QuorumPolicy::Grid, 3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nodes_end_released_with_votes_returned() {
    let config = config(5, QuorumPolicy::Grid, 2);
    let (cluster, _) = start(&config).await;
    drive(&cluster, Arc::new(Ledger::default())).await;

    // Releases are fire-and-forget; give the last ones time to land
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut settled = true;
        for handle in cluster.handles() {
            let snap = handle.snapshot().await.unwrap();
            settled &=
                snap.state == ProcState::Released && !snap.voted && snap.deferred.is_empty();
        }
        if settled {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "votes never returned");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cluster.shutdown().await;
}

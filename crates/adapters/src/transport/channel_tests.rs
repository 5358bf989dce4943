// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn cluster(n: u32) -> (ChannelNetwork, Vec<ChannelTransport>, Vec<mpsc::Receiver<Message>>) {
    let network = ChannelNetwork::new();
    let mut transports = Vec::new();
    let mut inboxes = Vec::new();
    for id in 0..n {
        let (tx, rx) = mpsc::channel(16);
        transports.push(network.register(NodeId(id), tx));
        inboxes.push(rx);
    }
    (network, transports, inboxes)
}

#[tokio::test]
async fn delivers_to_destination_inbox() {
    let (_network, transports, mut inboxes) = cluster(3);
    let msg = Message::request(NodeId(0), NodeId(2)).stamped(1);

    transports[0].send(&msg).await.unwrap();

    assert_eq!(inboxes[2].try_recv().unwrap(), msg);
    assert!(inboxes[1].try_recv().is_err());
}

#[tokio::test]
async fn multicast_keeps_one_timestamp() {
    let (_network, transports, mut inboxes) = cluster(3);
    let msg = Message::release(NodeId(1), NodeId(1)).stamped(7);

    transports[1]
        .multicast(&[NodeId(0), NodeId(1), NodeId(2)], &msg)
        .await
        .unwrap();

    for (id, inbox) in inboxes.iter_mut().enumerate() {
        let got = inbox.try_recv().unwrap();
        assert_eq!(got.dest, NodeId(id as u32));
        assert_eq!(got.ts, 7);
    }
}

#[tokio::test]
async fn partition_drops_both_directions_until_healed() {
    let (network, transports, mut inboxes) = cluster(2);
    network.partition(NodeId(1));
    assert!(network.is_partitioned(NodeId(1)));

    transports[0]
        .send(&Message::request(NodeId(0), NodeId(1)))
        .await
        .unwrap();
    transports[1]
        .send(&Message::grant(NodeId(1), NodeId(0)))
        .await
        .unwrap();
    assert!(inboxes[0].try_recv().is_err());
    assert!(inboxes[1].try_recv().is_err());
    assert_eq!(network.dropped(), 2);

    // Loopback still works inside the partition
    transports[1]
        .send(&Message::request(NodeId(1), NodeId(1)))
        .await
        .unwrap();
    assert!(inboxes[1].try_recv().is_ok());

    network.heal(NodeId(1));
    transports[0]
        .send(&Message::request(NodeId(0), NodeId(1)))
        .await
        .unwrap();
    assert!(inboxes[1].try_recv().is_ok());
}

#[tokio::test]
async fn unknown_destination_is_an_error() {
    let (_network, transports, _inboxes) = cluster(1);
    let err = transports[0]
        .send(&Message::request(NodeId(0), NodeId(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::UnknownPeer(NodeId(5))));
}

#[tokio::test]
async fn closed_inbox_is_reported() {
    let (_network, transports, mut inboxes) = cluster(2);
    drop(inboxes.remove(1));
    let err = transports[0]
        .send(&Message::grant(NodeId(0), NodeId(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Closed(NodeId(1))));
}

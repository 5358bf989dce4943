//! Wire format specs
//!
//! Nodes exchange newline-delimited JSON records. A malformed record is
//! skipped; the connection and the node carry on.

use crate::prelude::*;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn garbage_on_the_wire_does_not_stop_a_node() {
    let config = config(3, QuorumPolicy::Grid, 2);
    let (cluster, addrs) = start(&config).await;

    let mut stream = TcpStream::connect(addrs[0]).await.unwrap();
    stream.write_all(b"this is not json\n{\"msg_type\":").await.unwrap();
    stream.write_all(b"\"bogus\"}\n").await.unwrap();
    let greeting = Message::greeting(NodeId(2), NodeId(0), "hello").stamped(500);
    stream.write_all(&encode(&greeting).unwrap()).await.unwrap();
    stream.flush().await.unwrap();

    let node0 = cluster.handles()[0].clone();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node0.snapshot().await.unwrap().clock <= 500 {
        assert!(tokio::time::Instant::now() < deadline, "greeting never observed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let reports = drive(&cluster, Arc::new(Ledger::default())).await;
    assert!(reports.iter().all(|r| r.acquisitions == 2));
    cluster.shutdown().await;
}

#[tokio::test]
async fn records_split_across_writes_are_reassembled() {
    let config = config(2, QuorumPolicy::Grid, 1);
    let (cluster, addrs) = start(&config).await;

    let bytes = encode(&Message::greeting(NodeId(1), NodeId(0), "split").stamped(40)).unwrap();
    let (head, tail) = bytes.split_at(bytes.len() / 2);
    let mut stream = TcpStream::connect(addrs[0]).await.unwrap();
    stream.write_all(head).await.unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(tail).await.unwrap();

    let node0 = cluster.handles()[0].clone();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node0.snapshot().await.unwrap().clock <= 40 {
        assert!(tokio::time::Instant::now() < deadline, "split record never observed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cluster.shutdown().await;
}

//! Integration tests for a running Peernet node: real loopback UDP sockets,
//! no mocked transport.

use std::time::Duration;

use peernet_core::packet::Command;
use peernet_node::{PeernetConfig, PeernetNode};

async fn spawn_node() -> (PeernetNode, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let config = PeernetConfig::default()
        .with_data_dir(dir.path())
        .with_listen_ipv4("127.0.0.1:0".parse().unwrap());
    let node = PeernetNode::new(config).await.unwrap();
    node.start().await.unwrap();
    (node, dir)
}

#[tokio::test]
async fn lifecycle_start_stop() {
    let (node, _dir) = spawn_node().await;
    assert!(node.is_started());
    node.stop().await.unwrap();
    assert!(!node.is_started());
}

#[tokio::test]
async fn ping_upserts_sender_into_peerlist() {
    let (node_a, _dir_a) = spawn_node().await;
    let (node_b, _dir_b) = spawn_node().await;

    let addr_b = node_b.backend().local_record_address().unwrap();

    node_a
        .backend()
        .send_raw(addr_b, Command::Ping, 1, Vec::new())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let node_a_id = node_a.node_id();
    assert!(
        node_b.backend().peerlist.lookup_by_node_id(&node_a_id).is_some(),
        "node B should have learned about node A from the Ping"
    );

    node_a.stop().await.unwrap();
    node_b.stop().await.unwrap();
}

#[tokio::test]
async fn local_discovery_triggers_bootstrap_announcement() {
    let (node_a, _dir_a) = spawn_node().await;
    let (node_b, _dir_b) = spawn_node().await;

    let addr_b = node_b.backend().local_record_address().unwrap();

    let announcement = peernet_codec::announcement::MessageAnnouncement {
        features: peernet_core::identity::Features::empty(),
        actions: peernet_codec::announcement::Actions::empty(),
        find_peer_keys: vec![],
        find_data_keys: vec![],
        info_store_files: vec![],
    };

    node_a
        .backend()
        .send_raw(
            addr_b,
            Command::LocalDiscovery,
            42,
            announcement.encode().to_vec(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let node_a_id = node_a.node_id();
    let node_b_id = node_b.node_id();
    assert!(node_b.backend().peerlist.lookup_by_node_id(&node_a_id).is_some());
    // Node B should have answered with a bootstrap FIND_SELF Announcement,
    // which makes node A learn about node B in turn.
    assert!(node_a.backend().peerlist.lookup_by_node_id(&node_b_id).is_some());

    node_a.stop().await.unwrap();
    node_b.stop().await.unwrap();
}

use std::time::Duration;

use swim_membership::{
    api::{config::SwimConfig, swim::SwimCluster},
    Event, MemberState, NodeDeceased, NodeJoined, NodeRecovered, NodeSuspected,
};

macro_rules! assert_event {
    ($event:path, $rx:expr, $ms:expr, $assertion:expr) => {
        let result = tokio::time::timeout(Duration::from_millis($ms), async {
            loop {
                match $rx.recv().await {
                    Ok(outer_event) => {
                        if let $event(inner_event) = outer_event {
                            if $assertion(inner_event) {
                                break;
                            }
                        }
                    }
                    Err(_) => panic!(),
                }
            }
        })
        .await;

        if result.is_err() {
            panic!()
        }
    };
}

async fn create_single_node(known_peers: &[String]) -> SwimCluster {
    let config = SwimConfig::builder()
        .with_ping_interval(Duration::from_millis(100))
        .with_ping_timeout(Duration::from_millis(30))
        .with_ping_req_timeout(Duration::from_millis(50))
        .with_suspect_timeout(Duration::from_secs(2))
        .with_gossip_max_send(20)
        .with_known_peers(known_peers)
        .build();
    SwimCluster::try_new("127.0.0.1:0", config).await.unwrap()
}

async fn create_cluster() -> (SwimCluster, SwimCluster, SwimCluster) {
    let node1 = create_single_node(&[]).await;
    let contact = [node1.addr().to_string()];
    let node2 = create_single_node(&contact).await;
    let node3 = create_single_node(&contact).await;

    (node1, node2, node3)
}

async fn wait_for_members(node: &SwimCluster, expected: usize, ms: u64) {
    let result = tokio::time::timeout(Duration::from_millis(ms), async {
        loop {
            let alive = node
                .members()
                .await
                .iter()
                .filter(|entry| entry.state() == MemberState::Alive)
                .count();
            if alive == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    if result.is_err() {
        panic!("[{}] never saw {expected} alive members", node.addr())
    }
}

#[tokio::test]
async fn test_swim_cluster_node_join_events() {
    let (node1, node2, node3) = create_cluster().await;

    let mut rx1 = node1.subscribe();
    let mut rx2 = node2.subscribe();
    let mut rx3 = node3.subscribe();

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    node3.run().await.unwrap();

    let host2 = node2.host();
    assert_event!(Event::NodeJoined, rx1, 1000, |e: NodeJoined| e.member == host2);
    assert_event!(Event::NodeJoined, rx2, 1000, |_| true);
    assert_event!(Event::NodeJoined, rx3, 1000, |_| true);

    wait_for_members(&node1, 3, 3000).await;
    wait_for_members(&node2, 3, 3000).await;
    wait_for_members(&node3, 3, 3000).await;
}

#[tokio::test]
async fn test_swim_cluster_node_suspect_events() {
    let (node1, node2, node3) = create_cluster().await;

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    let handles = node3.run().await.unwrap();

    wait_for_members(&node1, 3, 3000).await;
    wait_for_members(&node2, 3, 3000).await;

    let mut rx1 = node1.subscribe();
    let mut rx2 = node2.subscribe();

    tracing::info!("[{}] is shutting down...", node3.addr());
    handles.0.abort();
    handles.1.abort();

    let host3 = node3.host();
    assert_event!(Event::NodeSuspected, rx1, 3000, |e: NodeSuspected| e.suspect == host3);
    assert_event!(Event::NodeSuspected, rx2, 3000, |e: NodeSuspected| e.suspect == host3);
}

#[tokio::test]
async fn test_swim_cluster_node_recover_event() {
    let (node1, node2, node3) = create_cluster().await;

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    let handles = node3.run().await.unwrap();

    wait_for_members(&node1, 3, 3000).await;

    let mut rx1 = node1.subscribe();

    handles.0.abort();
    handles.1.abort();

    let host3 = node3.host();
    assert_event!(Event::NodeSuspected, rx1, 3000, |e: NodeSuspected| e.suspect == host3);

    // same identity comes back and refutes the suspicion with a higher incarnation
    node3.run().await.unwrap();

    assert_event!(Event::NodeRecovered, rx1, 2000, |e: NodeRecovered| {
        e.recovered == host3 && e.incarnation > 0
    });
    assert_eq!(node1.member_state(&host3.id()).await, Some(MemberState::Alive));
}

#[tokio::test]
async fn test_swim_cluster_node_leave_event() {
    let (node1, node2, node3) = create_cluster().await;

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    node3.run().await.unwrap();

    wait_for_members(&node1, 3, 3000).await;
    wait_for_members(&node2, 3, 3000).await;
    wait_for_members(&node3, 3, 3000).await;

    let mut rx1 = node1.subscribe();
    let mut rx2 = node2.subscribe();

    // node3 stays alive as a process after leaving
    node3.leave().await.unwrap();

    let host3 = node3.host();
    assert_event!(Event::NodeDeceased, rx1, 1000, |e: NodeDeceased| e.deceased == host3);
    assert_event!(Event::NodeDeceased, rx2, 1000, |e: NodeDeceased| e.deceased == host3);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(node1.member_state(&host3.id()).await, Some(MemberState::Dead));
    assert_eq!(node2.member_state(&host3.id()).await, Some(MemberState::Dead));
    while let Ok(event) = rx1.try_recv() {
        assert!(!matches!(event, Event::NodeRecovered(e) if e.recovered == host3));
    }
}

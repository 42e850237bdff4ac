use swim_membership::{
    api::{config::SwimConfig, swim::SwimCluster},
    Event, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Creates two nodes in the same cluster
    let node1 = SwimCluster::try_new("127.0.0.1:8000", SwimConfig::new()).await?;
    let node2 = SwimCluster::try_new(
        "127.0.0.1:8001",
        SwimConfig::builder()
            .with_known_peers(["127.0.0.1:8000"])
            .build(),
    )
    .await?;

    // Subscribe before running so no event is missed
    let mut rx1 = node1.subscribe();

    node1.run().await?;
    let (receiver, detector) = node2.run().await?;

    // Stop node2 once it has joined, node1 will suspect and then bury it
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        receiver.abort();
        detector.abort();
    });

    while let Ok(event) = rx1.recv().await {
        match event {
            Event::NodeJoined(e) => tracing::info!("[{}] handle {:#?}", node1.addr(), e),
            Event::NodeSuspected(e) => tracing::info!("[{}] handle {:#?}", node1.addr(), e),
            Event::NodeRecovered(e) => tracing::info!("[{}] handle {:#?}", node1.addr(), e),
            Event::NodeDeceased(e) => {
                tracing::info!("[{}] handle {:#?}", node1.addr(), e);
                break;
            }
        }
    }

    Ok(())
}

use std::time::Duration;

use swim_membership::{
    api::{config::SwimConfig, swim::SwimCluster},
    Result,
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

    // Run the SWIM protocol in the background
    node1.run().await?;
    node2.run().await?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    for entry in node1.members().await {
        println!(
            "{} {:?} at incarnation {}",
            entry.host(),
            entry.state(),
            entry.incarnation()
        );
    }

    node2.leave().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    Ok(())
}

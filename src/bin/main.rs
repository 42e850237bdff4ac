//! Runs a single SWIM membership node.
//!
//! Usage:
//!   # first node
//!   swim --port 8000
//!
//!   # further nodes join through any running member
//!   swim --port 8001 127.0.0.1:8000
//!
//!   # on a shared network, bind to the address peers should reach
//!   swim --host 10.0.0.5 --port 8000
use clap::Parser;
use swim_membership::{
    api::{config::SwimConfig, swim::SwimCluster},
    error::Result,
    utils::format_address,
    Event,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SWIM cluster membership and failure detection node.
#[derive(Parser, Debug)]
#[command(name = "swim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IPv4 address to bind and advertise to peers
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// UDP port to listen on; join transfers are served on the same TCP port
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Contact node to join through, as `host:port` or a bare port
    contact: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SwimConfig::builder()
        .with_known_peers(cli.contact.iter())
        .build();
    let cluster = SwimCluster::try_new(format_address(&cli.host, cli.port), config).await?;

    let mut events = cluster.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::NodeJoined(e)) => tracing::info!("{} joined", e.member),
                Ok(Event::NodeSuspected(e)) => tracing::info!("{} is suspected", e.suspect),
                Ok(Event::NodeRecovered(e)) => tracing::info!("{} recovered", e.recovered),
                Ok(Event::NodeDeceased(e)) => tracing::info!("{} is dead", e.deceased),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("event log fell behind, {skipped} events skipped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (receiver, detector) = cluster.run().await?;
    tracing::info!("node {} listening on {}", cluster.host().id(), cluster.addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, leaving the cluster");
    if let Err(e) = cluster.leave().await {
        tracing::warn!("failed to announce leave: {e}");
    }

    receiver.abort();
    detector.abort();
    Ok(())
}

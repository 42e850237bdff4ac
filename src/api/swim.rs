use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast::{self, Receiver};
use tokio::task::JoinHandle;

use crate::core::event::Event;
use crate::core::host::{HostId, HostRecord};
use crate::core::member::{MemberState, MembershipEntry};
use crate::core::node::SwimNode;
use crate::error::Result;
use crate::init_tracing;

use super::config::SwimConfig;

/// A SWIM node listening for datagrams on UDP and for join transfers on TCP,
/// both on the same address.
#[derive(Clone, Debug)]
pub struct SwimCluster {
    node: Arc<SwimNode<UdpSocket>>,
}

impl SwimCluster {
    pub async fn try_new(addr: impl AsRef<str>, config: SwimConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr.as_ref()).await?;
        // port 0 resolves on the UDP bind, the join listener follows it
        let listener = TcpListener::bind(socket.local_addr()?).await?;
        let (tx, _) = broadcast::channel::<Event>(32);
        let node = Arc::new(SwimNode::try_new(socket, Some(listener), config, tx)?);

        Ok(Self { node })
    }

    pub fn addr(&self) -> SocketAddr {
        self.node.addr()
    }

    pub fn host(&self) -> HostRecord {
        self.node.local()
    }

    pub fn config(&self) -> &SwimConfig {
        self.node.config()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.node.subscribe()
    }

    pub async fn members(&self) -> Vec<MembershipEntry> {
        self.node.members().await
    }

    pub async fn member_state(&self, id: &HostId) -> Option<MemberState> {
        self.node.member(id).await.map(|entry| entry.state())
    }

    /// Starts the node, joining through the first configured known peer.
    ///
    /// Returns the handles of the receive loop and the failure detector.
    pub async fn run(&self) -> Result<(JoinHandle<()>, JoinHandle<()>)> {
        init_tracing();

        tracing::info!("[{}] starting SwimNode...", self.node.addr());
        self.node.run().await
    }

    /// Stops the protocol loops and tells every alive member that this node
    /// is leaving.
    pub async fn leave(&self) -> Result<()> {
        self.node.leave().await
    }
}

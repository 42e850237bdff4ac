use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::config::{SwimConfig, DEFAULT_BUFFER_SIZE};
use crate::error::Result;
use crate::utils::parse_address;

use super::detection::FailureDetector;
use super::event::Event;
use super::host::{HostId, HostRecord};
use super::join::{fetch_snapshot, serve_snapshot};
use super::member::{MembershipEntry, Notification};
use super::probe::ProbeRegistry;
use super::receiver::MessageReceiver;
use super::sender::MessageSender;
use super::state::SwimState;
use super::transport::TransportLayer;

/// A single SWIM protocol participant.
///
/// Owns the membership state of the process and wires the receive loop,
/// the failure detector and the join listener to it.
#[derive(Debug)]
pub struct SwimNode<T: TransportLayer> {
    local: HostRecord,
    config: Arc<SwimConfig>,
    state: Arc<Mutex<SwimState>>,
    listener: Option<Arc<TcpListener>>,
    receiver: MessageReceiver<T>,
    detector: FailureDetector<T>,
    sender: MessageSender<T>,
    tx: broadcast::Sender<Event>,
    shutdown: broadcast::Sender<()>,
}

impl<T: TransportLayer> SwimNode<T> {
    /// Creates a node on top of `socket`. Join requests are served from
    /// `listener` when one is given.
    pub fn try_new(
        socket: T,
        listener: Option<TcpListener>,
        config: SwimConfig,
        tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        let local = HostRecord::local(socket.local_addr()?);
        let addr = local.socket_addr();
        let socket = Arc::new(socket);
        let config = Arc::new(config);
        let state = Arc::new(Mutex::new(SwimState::new(local, &config, tx.clone())));
        let probes = Arc::new(ProbeRegistry::new());
        let (shutdown, _) = broadcast::channel(1);

        let sender = MessageSender::new(local, socket.clone(), state.clone());
        let receiver = MessageReceiver::new(
            addr,
            config.clone(),
            socket,
            state.clone(),
            probes.clone(),
            sender.clone(),
        );
        let detector = FailureDetector::new(
            addr,
            config.clone(),
            state.clone(),
            probes,
            sender.clone(),
        );

        Ok(Self {
            local,
            config,
            state,
            listener: listener.map(Arc::new),
            receiver,
            detector,
            sender,
            tx,
            shutdown,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.local.socket_addr()
    }

    pub fn local(&self) -> HostRecord {
        self.local
    }

    pub fn config(&self) -> &SwimConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// A copy of every entry in the membership table, the local host included.
    pub async fn members(&self) -> Vec<MembershipEntry> {
        self.state.lock().await.members().entries().copied().collect()
    }

    pub async fn member(&self, id: &HostId) -> Option<MembershipEntry> {
        self.state.lock().await.members().get(id)
    }

    /// Starts the receive loop, joins through the first known peer, if any,
    /// and starts the failure detector.
    ///
    /// Returns the handles of the receive loop and the failure detector.
    pub async fn run(&self) -> Result<(JoinHandle<()>, JoinHandle<()>)> {
        let receiver_handle = self.spawn_receiver();

        if let Some(contact) = self.config.known_peers().first() {
            if let Err(e) = self.join(contact).await {
                tracing::error!("[{}] failed to join {contact}: {e}", self.addr());
                receiver_handle.abort();
                return Err(e);
            }
        }

        let detector = self.detector.clone();
        let mut shutdown = self.shutdown.subscribe();
        let detector_handle = tokio::spawn(async move {
            tokio::select! {
                _ = detector.run() => {}
                _ = shutdown.recv() => {}
            }
        });

        Ok((receiver_handle, detector_handle))
    }

    /// Pulls the membership snapshot from `contact` and announces the local
    /// host to it. Not retried on failure.
    pub async fn join(&self, contact: &str) -> Result<()> {
        let contact = parse_address(contact)?;
        tracing::info!("[{}] joining through {contact}", self.addr());

        let records = fetch_snapshot(contact, self.config.join_timeout()).await?;
        {
            let now = Instant::now();
            let mut state = self.state.lock().await;
            for record in &records {
                state.apply(&Notification::alive(*record, 0), now);
            }
        }

        self.sender.send_join(contact).await;
        Ok(())
    }

    /// Stops the receive loop and the failure detector, then announces a
    /// graceful exit to every member currently considered alive.
    ///
    /// The loops stop first so that no later claim about our death is refuted.
    pub async fn leave(&self) -> Result<()> {
        let _ = self.shutdown.send(());

        let members = self.state.lock().await.alive_members();
        tracing::info!("[{}] leaving, notifying {} members", self.addr(), members.len());

        for member in &members {
            self.sender.send_leave(member.socket_addr()).await;
        }

        Ok(())
    }

    fn spawn_receiver(&self) -> JoinHandle<()> {
        let receiver = self.receiver.clone();
        let listener = self.listener.clone();
        let state = self.state.clone();
        let addr = self.addr();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut buf = [0u8; DEFAULT_BUFFER_SIZE];

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::debug!("[{addr}] receive loop stopped");
                        break;
                    }
                    result = receiver.recv(&mut buf) => match result {
                        Ok((len, from)) => receiver.dispatch(&buf[..len], from).await,
                        Err(e) => tracing::warn!("[{addr}] error while receiving message: {e}"),
                    },
                    result = accept(listener.as_deref()) => match result {
                        Ok((stream, peer)) => {
                            let snapshot = state.lock().await.snapshot();
                            let count = snapshot.len();
                            tracing::debug!("[{addr}] sending {count} members to {peer}");
                            tokio::spawn(async move {
                                if let Err(e) = serve_snapshot(stream, &snapshot).await {
                                    tracing::warn!("[{addr}] join transfer to {peer} failed: {e}");
                                }
                            });
                        }
                        Err(e) => tracing::warn!("[{addr}] error while accepting join: {e}"),
                    },
                }
            }
        })
    }
}

async fn accept(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

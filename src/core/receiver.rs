use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::config::SwimConfig;
use crate::error::Result;

use super::host::HostRecord;
use super::member::Notification;
use super::message::{Action, Sequence, SwimMessage};
use super::probe::{wait_for_ack, ProbeOutcome, ProbeRegistry};
use super::sender::MessageSender;
use super::state::SwimState;
use super::transport::TransportLayer;

/// Decodes inbound datagrams and routes them by message type.
#[derive(Debug)]
pub(crate) struct MessageReceiver<T: TransportLayer> {
    addr: SocketAddr,
    config: Arc<SwimConfig>,
    socket: Arc<T>,
    state: Arc<Mutex<SwimState>>,
    probes: Arc<ProbeRegistry>,
    sender: MessageSender<T>,
}

impl<T: TransportLayer> Clone for MessageReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            config: self.config.clone(),
            socket: self.socket.clone(),
            state: self.state.clone(),
            probes: self.probes.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T: TransportLayer> MessageReceiver<T> {
    pub(crate) fn new(
        addr: SocketAddr,
        config: Arc<SwimConfig>,
        socket: Arc<T>,
        state: Arc<Mutex<SwimState>>,
        probes: Arc<ProbeRegistry>,
        sender: MessageSender<T>,
    ) -> Self {
        Self {
            addr,
            config,
            socket,
            state,
            probes,
            sender,
        }
    }

    pub(crate) async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Handles a single datagram. Malformed or foreign datagrams are dropped.
    pub(crate) async fn dispatch(&self, buf: &[u8], from: SocketAddr) {
        let message = match SwimMessage::decode(buf) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("[{}] dropping datagram from {from}: {e}", self.addr);
                return;
            }
        };

        self.handle_gossip(&message.gossip).await;

        match message.action {
            Action::Ping { seq } => self.handle_ping(seq, from).await,
            Action::Ack { seq } => self.handle_ack(seq, from),
            Action::PingReq { seq, target } => {
                self.handle_ping_req(seq, target, from);
            }
            Action::Join { host } => self.handle_join(host).await,
            Action::Leave { host } => self.handle_leave(host).await,
        }
    }

    async fn handle_gossip(&self, gossip: &[Notification]) {
        if gossip.is_empty() {
            return;
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        for notification in gossip {
            state.apply(notification, now);
        }
    }

    pub(crate) async fn handle_ping(&self, seq: Sequence, from: SocketAddr) {
        tracing::trace!("[{}] handling PING({seq}) from {from}", self.addr);
        self.sender.send_ack(seq, from).await;
    }

    pub(crate) fn handle_ack(&self, seq: Sequence, from: SocketAddr) {
        match self.probes.resolve(seq) {
            Some(target) => {
                tracing::trace!("[{}] ACK({seq}) for {target} from {from}", self.addr)
            }
            None => tracing::debug!("[{}] dropping unmatched ACK({seq}) from {from}", self.addr),
        }
    }

    /// Pings `target` on behalf of `requested_by` and forwards the ACK if one arrives.
    /// Runs in its own task so the receive loop is never blocked by the wait.
    pub(crate) fn handle_ping_req(
        &self,
        seq: Sequence,
        target: HostRecord,
        requested_by: SocketAddr,
    ) -> JoinHandle<()> {
        tracing::trace!(
            "[{}] handling PING_REQ({seq}) for {target} from {requested_by}",
            self.addr
        );

        let receiver = self.clone();
        tokio::spawn(async move {
            let (relay_seq, mut rx) = receiver.probes.register(target.id());
            receiver.sender.send_ping(relay_seq, &target).await;

            match wait_for_ack(&mut rx, receiver.config.ping_timeout()).await {
                ProbeOutcome::Acked => {
                    receiver
                        .state
                        .lock()
                        .await
                        .mark_alive(&target.id(), Instant::now());
                    receiver.sender.send_ack(seq, requested_by).await;
                }
                ProbeOutcome::TimedOut => receiver.probes.cancel(relay_seq),
            }
        })
    }

    pub(crate) async fn handle_join(&self, host: HostRecord) {
        tracing::debug!("[{}] handling JOIN from {host}", self.addr);
        self.state
            .lock()
            .await
            .apply(&Notification::alive(host, 0), Instant::now());
    }

    /// Marks `host` dead right away at the incarnation we know it by.
    pub(crate) async fn handle_leave(&self, host: HostRecord) {
        tracing::debug!("[{}] handling LEAVE from {host}", self.addr);

        let mut state = self.state.lock().await;
        let incarnation = state
            .members()
            .get(&host.id())
            .map(|entry| entry.incarnation())
            .unwrap_or_default();
        state.apply(&Notification::dead(host, incarnation), Instant::now());
    }
}

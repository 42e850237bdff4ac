use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::host::HostRecord;
use super::message::{Action, Sequence, SwimMessage};
use super::state::SwimState;
use super::transport::TransportLayer;

/// Encodes outgoing protocol messages and piggybacks pending notifications.
///
/// Send failures are logged and otherwise ignored: an unreachable host looks
/// exactly like one that never answers.
#[derive(Debug)]
pub(crate) struct MessageSender<T: TransportLayer> {
    local: HostRecord,
    socket: Arc<T>,
    state: Arc<Mutex<SwimState>>,
}

impl<T: TransportLayer> Clone for MessageSender<T> {
    fn clone(&self) -> Self {
        Self {
            local: self.local,
            socket: self.socket.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: TransportLayer> MessageSender<T> {
    pub(crate) fn new(local: HostRecord, socket: Arc<T>, state: Arc<Mutex<SwimState>>) -> Self {
        Self {
            local,
            socket,
            state,
        }
    }

    pub(crate) async fn send_ping(&self, seq: Sequence, target: &HostRecord) -> bool {
        tracing::debug!("[{}] sending PING({seq}) to {}", self.addr(), target);
        self.send(Action::Ping { seq }, target.socket_addr()).await
    }

    pub(crate) async fn send_ack(&self, seq: Sequence, target: SocketAddr) -> bool {
        tracing::debug!("[{}] sending ACK({seq}) to {}", self.addr(), target);
        self.send(Action::Ack { seq }, target).await
    }

    pub(crate) async fn send_ping_req(
        &self,
        seq: Sequence,
        suspect: &HostRecord,
        relay: &HostRecord,
    ) -> bool {
        tracing::debug!(
            "[{}] sending PING_REQ({seq}) for {} to {}",
            self.addr(),
            suspect,
            relay
        );
        let action = Action::PingReq {
            seq,
            target: *suspect,
        };
        self.send(action, relay.socket_addr()).await
    }

    pub(crate) async fn send_join(&self, target: SocketAddr) -> bool {
        tracing::debug!("[{}] sending JOIN to {}", self.addr(), target);
        self.send(Action::Join { host: self.local }, target).await
    }

    pub(crate) async fn send_leave(&self, target: SocketAddr) -> bool {
        tracing::debug!("[{}] sending LEAVE to {}", self.addr(), target);
        self.send(Action::Leave { host: self.local }, target).await
    }

    async fn send(&self, action: Action, target: SocketAddr) -> bool {
        let gossip = self.state.lock().await.gossip();
        let buf = SwimMessage::new(action, gossip).encode();

        match self.socket.send_to(&buf, target).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("[{}] failed to send {action:?} to {target}: {e}", self.addr());
                false
            }
        }
    }

    fn addr(&self) -> SocketAddr {
        self.local.socket_addr()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use tokio::sync::{broadcast, Mutex};
    use tokio::time::Instant;

    use crate::{
        api::config::SwimConfig,
        core::{
            host::{HostId, HostRecord},
            member::Notification,
            message::{Action, SwimMessage},
            state::SwimState,
        },
        test_utils::mocks::MockUdpSocket,
    };

    use super::MessageSender;

    fn host(port: u16) -> HostRecord {
        HostRecord::new(HostId::random(), Ipv4Addr::LOCALHOST, port)
    }

    fn create_sender() -> (
        MessageSender<MockUdpSocket>,
        Arc<Mutex<SwimState>>,
        Arc<MockUdpSocket>,
    ) {
        let local = host(8000);
        let (tx, _) = broadcast::channel(32);
        let state = Arc::new(Mutex::new(SwimState::new(local, &SwimConfig::new(), tx)));
        let socket = Arc::new(MockUdpSocket::new());
        let sender = MessageSender::new(local, socket.clone(), state.clone());

        (sender, state, socket)
    }

    #[tokio::test]
    async fn test_sender_piggybacks_gossip() {
        let (sender, state, socket) = create_sender();
        let b = host(8001);
        let c = host(8002);
        state
            .lock()
            .await
            .apply(&Notification::alive(c, 0), Instant::now());

        assert!(sender.send_ping(3, &b).await);

        let (message, target) = &socket.transmitted().await[0];
        assert_eq!(*target, b.socket_addr());
        assert_eq!(
            message,
            &SwimMessage::new(Action::Ping { seq: 3 }, vec![Notification::alive(c, 0)])
        );
    }

    #[tokio::test]
    async fn test_sender_join_and_leave_carry_local_host() {
        let (sender, state, socket) = create_sender();
        let local = state.lock().await.local();
        let contact = host(8001).socket_addr();

        sender.send_join(contact).await;
        sender.send_leave(contact).await;

        let transmitted = socket.transmitted().await;
        assert_eq!(transmitted[0].0.action, Action::Join { host: local });
        assert_eq!(transmitted[1].0.action, Action::Leave { host: local });
    }

    #[tokio::test]
    async fn test_sender_send_failure_is_not_an_error() {
        let (sender, _, socket) = create_sender();
        socket.fail_sends(true);

        assert!(!sender.send_ack(1, host(8001).socket_addr()).await);
        assert!(socket.transmitted().await.is_empty());
    }
}

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::core::{message::SwimMessage, transport::TransportLayer};
use crate::error::{Error, Result};

type Datagram = (Vec<u8>, SocketAddr);

/// In-memory datagram socket.
///
/// Every sent datagram is decoded and recorded; datagrams handed to
/// [`MockUdpSocket::inject`] are returned by `recv_from` in order.
#[derive(Clone, Debug)]
pub(crate) struct MockUdpSocket {
    transmitted: Arc<Mutex<Vec<(SwimMessage, SocketAddr)>>>,
    inbound_tx: mpsc::UnboundedSender<Datagram>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<Datagram>>>,
    fail_sends: Arc<AtomicBool>,
}

impl Default for MockUdpSocket {
    fn default() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        Self {
            transmitted: Arc::default(),
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            fail_sends: Arc::default(),
        }
    }
}

impl MockUdpSocket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn transmitted(&self) -> Vec<(SwimMessage, SocketAddr)> {
        let tx = self.transmitted.lock().await;
        (*tx).clone()
    }

    pub(crate) fn inject(&self, buf: &[u8], from: SocketAddr) {
        let _ = self.inbound_tx.send((buf.to_vec(), from));
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportLayer for MockUdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let mut rx = self.inbound_rx.lock().await;

        match rx.recv().await {
            Some((datagram, from)) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok((len, from))
            }
            None => Err(Error::Internal {
                message: "mock socket closed".to_string(),
                location: snafu::location!(),
            }),
        }
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
        }

        let message = SwimMessage::decode(buf)?;
        self.transmitted.lock().await.push((message, target));

        Ok(buf.len())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok("127.0.0.1:8000".parse()?)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use crate::core::{
        host::{HostId, HostRecord},
        message::{Action, SwimMessage},
        transport::TransportLayer,
    };

    use super::MockUdpSocket;

    #[tokio::test]
    async fn test_mock_udp_socket_send_to() {
        let socket = MockUdpSocket::new();
        let message = SwimMessage::new(Action::Ping { seq: 1 }, vec![]);
        let target: SocketAddr = "127.0.0.1:8001".parse().unwrap();

        socket.send_to(&message.encode(), target).await.unwrap();

        assert_eq!(socket.transmitted().await, vec![(message, target)]);
    }

    #[tokio::test]
    async fn test_mock_udp_socket_received() {
        let socket = MockUdpSocket::new();
        let host = HostRecord::new(HostId::random(), Ipv4Addr::LOCALHOST, 8001);
        let message = SwimMessage::new(Action::Join { host }, vec![]);
        socket.inject(&message.encode(), host.socket_addr());

        let mut buf = [0u8; 64];
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();

        assert_eq!(from, host.socket_addr());
        assert_eq!(SwimMessage::decode(&buf[..len]).unwrap(), message);
    }
}

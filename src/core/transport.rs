//! # Transport Layer Module
//!
//! This module defines the `TransportLayer` trait, which abstracts the datagram transport
//! used by the SWIM protocol implementation. The protocol only needs to send a datagram to
//! an address and to receive the next datagram together with its source address.
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::error::Result;

/// The `TransportLayer` trait abstracts the network transport layer.
#[async_trait]
pub trait TransportLayer: Send + Sync + 'static {
    /// Receives a single datagram into `buf`, returning its length and sender.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Sends `buf` as a single datagram to `target`.
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    /// Retrieves the local address that the socket is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;
}

#[async_trait]
impl TransportLayer for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(UdpSocket::recv_from(self, buf).await?)
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        Ok(UdpSocket::send_to(self, buf, target).await?)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(UdpSocket::local_addr(self)?)
    }
}

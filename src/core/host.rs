//! # Host Module
//!
//! Identity of a single peer and its fixed-width wire representation.
//!
//! A [`HostRecord`] always encodes to exactly [`HOST_RECORD_LEN`] bytes
//! (big-endian): 16 bytes id, 4 bytes IPv4 address, 2 bytes port.
//! The join transfer relies on this width to split a byte stream into frames.
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Length of an encoded [`HostRecord`] in bytes.
pub const HOST_RECORD_LEN: usize = 22;

/// Opaque 128-bit process identifier, generated once at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(Uuid);

impl HostId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A peer identity: who it is and where its gossip socket listens.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostRecord {
    id: HostId,
    addr: Ipv4Addr,
    port: u16,
}

impl HostRecord {
    pub fn new(id: HostId, addr: Ipv4Addr, port: u16) -> Self {
        Self { id, addr, port }
    }

    /// Creates a record for the local process with a fresh [`HostId`].
    ///
    /// Unspecified or IPv6 addresses are advertised as `127.0.0.1`.
    pub fn local(addr: SocketAddr) -> Self {
        let ip = match addr {
            SocketAddr::V4(v4) if !v4.ip().is_unspecified() => *v4.ip(),
            _ => Ipv4Addr::LOCALHOST,
        };

        Self::new(HostId::random(), ip, addr.port())
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.addr, self.port))
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.id.as_bytes());
        buf.put_slice(&self.addr.octets());
        buf.put_u16(self.port);
    }

    pub fn to_bytes(&self) -> [u8; HOST_RECORD_LEN] {
        let mut out = [0u8; HOST_RECORD_LEN];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Reads one record from `buf`, advancing it by [`HOST_RECORD_LEN`] bytes.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < HOST_RECORD_LEN {
            return Err(Error::malformed(format!(
                "host record needs {HOST_RECORD_LEN} bytes, {} remaining",
                buf.remaining()
            )));
        }

        let mut id = [0u8; 16];
        buf.copy_to_slice(&mut id);
        let mut addr = [0u8; 4];
        buf.copy_to_slice(&mut addr);
        let port = buf.get_u16();

        Ok(Self::new(HostId::from_bytes(id), Ipv4Addr::from(addr), port))
    }
}

impl fmt::Display for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.addr, self.port)
    }
}

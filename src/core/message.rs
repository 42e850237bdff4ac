//! # Message Module
//!
//! Wire format of the UDP gossip channel.
//!
//! ```text
//! +-------+------+---------+----------------------------------------------+
//! | magic | type | payload | notification*                                |
//! | 2     | 1    | var     | magic(2) state(1) host(22) incarnation(4, BE) |
//! +-------+------+---------+----------------------------------------------+
//! ```
//!
//! PING and ACK carry a 4-byte sequence number, PING-REQ a sequence number
//! followed by the target host, JOIN and LEAVE a single host.
use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};

use super::host::{HostRecord, HOST_RECORD_LEN};
use super::member::{MemberState, Notification};

pub(crate) const PROTOCOL_MAGIC: u16 = 0xDEED;
pub(crate) const NOTIFICATION_MAGIC: u16 = 0xF00D;

/// Encoded size of a single piggybacked notification.
pub(crate) const NOTIFICATION_LEN: usize = 2 + 1 + HOST_RECORD_LEN + 4;

const PING: u8 = 0x00;
const ACK: u8 = 0x01;
const PING_REQ: u8 = 0x03;
const JOIN: u8 = 0x04;
const LEAVE: u8 = 0x05;

/// Correlates an ACK with the PING or PING-REQ it answers.
pub type Sequence = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Ping { seq: Sequence },
    Ack { seq: Sequence },
    PingReq { seq: Sequence, target: HostRecord },
    Join { host: HostRecord },
    Leave { host: HostRecord },
}

impl Action {
    fn kind(&self) -> u8 {
        match self {
            Action::Ping { .. } => PING,
            Action::Ack { .. } => ACK,
            Action::PingReq { .. } => PING_REQ,
            Action::Join { .. } => JOIN,
            Action::Leave { .. } => LEAVE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SwimMessage {
    pub(crate) action: Action,
    pub(crate) gossip: Vec<Notification>,
}

impl SwimMessage {
    pub(crate) fn new(action: Action, gossip: Vec<Notification>) -> Self {
        Self { action, gossip }
    }

    pub(crate) fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(
            3 + 4 + HOST_RECORD_LEN + self.gossip.len() * NOTIFICATION_LEN,
        );

        buf.put_u16(PROTOCOL_MAGIC);
        buf.put_u8(self.action.kind());

        match &self.action {
            Action::Ping { seq } | Action::Ack { seq } => buf.put_u32(*seq),
            Action::PingReq { seq, target } => {
                buf.put_u32(*seq);
                target.encode(&mut buf);
            }
            Action::Join { host } | Action::Leave { host } => host.encode(&mut buf),
        }

        for notification in &self.gossip {
            buf.put_u16(NOTIFICATION_MAGIC);
            buf.put_u8(notification.state.to_byte());
            notification.host.encode(&mut buf);
            buf.put_u32(notification.incarnation);
        }

        buf
    }

    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < 3 {
            return Err(Error::malformed("datagram shorter than header"));
        }

        let magic = buf.get_u16();
        if magic != PROTOCOL_MAGIC {
            return Err(Error::malformed(format!("unknown protocol magic {magic:#06x}")));
        }

        let action = match buf.get_u8() {
            PING => Action::Ping {
                seq: read_seq(&mut buf)?,
            },
            ACK => Action::Ack {
                seq: read_seq(&mut buf)?,
            },
            PING_REQ => Action::PingReq {
                seq: read_seq(&mut buf)?,
                target: HostRecord::decode(&mut buf)?,
            },
            JOIN => Action::Join {
                host: HostRecord::decode(&mut buf)?,
            },
            LEAVE => Action::Leave {
                host: HostRecord::decode(&mut buf)?,
            },
            other => return Err(Error::malformed(format!("unknown message type {other:#04x}"))),
        };

        let mut gossip = Vec::new();
        while buf.has_remaining() {
            gossip.push(read_notification(&mut buf)?);
        }

        Ok(Self { action, gossip })
    }
}

fn read_seq(buf: &mut &[u8]) -> Result<Sequence> {
    if buf.remaining() < 4 {
        return Err(Error::malformed("truncated sequence number"));
    }

    Ok(buf.get_u32())
}

fn read_notification(buf: &mut &[u8]) -> Result<Notification> {
    if buf.remaining() < NOTIFICATION_LEN {
        return Err(Error::malformed("truncated notification"));
    }

    let magic = buf.get_u16();
    if magic != NOTIFICATION_MAGIC {
        return Err(Error::malformed(format!(
            "unknown notification magic {magic:#06x}"
        )));
    }

    let state = buf.get_u8();
    let state = MemberState::from_byte(state)
        .ok_or_else(|| Error::malformed(format!("unknown member state {state}")))?;
    let host = HostRecord::decode(buf)?;
    let incarnation = buf.get_u32();

    Ok(Notification::new(host, state, incarnation))
}

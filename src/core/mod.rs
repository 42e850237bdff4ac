//! # Core Module
//!
//! The `core` module contains the SWIM protocol machinery: host records and
//! their wire codec, the membership table, notification dissemination, the
//! message codec, failure detection, the receive path, the join transfer and
//! the node that ties them together.
pub(crate) mod detection;
pub(crate) mod disseminate;
pub(crate) mod event;
pub(crate) mod host;
pub(crate) mod join;
pub(crate) mod member;
pub(crate) mod message;
pub(crate) mod node;
pub(crate) mod probe;
pub(crate) mod receiver;
pub(crate) mod sender;
pub(crate) mod state;
pub(crate) mod transport;

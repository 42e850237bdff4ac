use std::time::Duration;

use crate::core::host::HOST_RECORD_LEN;

/// Default protocol period: one probe round is started per interval.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(1000);

/// Default wait for a direct ACK before relays are asked to probe.
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(300);

/// Default number of nodes asked to relay a PING-REQ.
const DEFAULT_PING_REQ_GROUP_SIZE: usize = 4;

/// Default wait for a relayed ACK before the target becomes `Suspect`.
const DEFAULT_PING_REQ_TIMEOUT: Duration = Duration::from_millis(600);

/// Default time a node stays `Suspect` before it is declared `Dead`.
const DEFAULT_SUSPECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default time a `Dead` node is remembered before it is removed from the table.
const DEFAULT_DEAD_MEMBER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of messages each notification is piggybacked on.
const DEFAULT_GOSSIP_MAX_SEND: usize = 6;

/// Default upper bound in bytes for the notifications attached to one message.
const DEFAULT_GOSSIP_MAX_SIZE: usize = 1024;

/// Default timeout for fetching the membership snapshot when joining.
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Receive buffer for a single datagram.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 1536;

/// Largest notification budget that still fits the receive buffer next to the
/// biggest header (magic, type, sequence and host record of a PING-REQ).
pub(crate) const MAX_GOSSIP_SIZE: usize = DEFAULT_BUFFER_SIZE - (3 + 4 + HOST_RECORD_LEN);

/// Builder for [`SwimConfig`]. Every setting starts at its `DEFAULT_*` value.
#[derive(Clone, Debug)]
pub struct SwimConfigBuilder {
    /// Contact addresses, `host:port` or a bare port.
    known_peers: Vec<String>,
    /// The protocol period between consecutive probe rounds.
    ping_interval: Duration,
    /// Direct ACK wait.
    ping_timeout: Duration,
    /// Relays per indirect probe.
    ping_req_group_size: usize,
    /// Relayed ACK wait.
    ping_req_timeout: Duration,
    /// The duration a node stays suspected before it is declared dead.
    suspect_timeout: Duration,
    /// The duration a dead node is kept before it is removed.
    dead_member_timeout: Duration,
    /// How often a single notification is piggybacked.
    gossip_max_send: usize,
    /// Byte budget for piggybacked notifications per message.
    gossip_max_size: usize,
    /// The duration to wait for the membership snapshot when joining.
    join_timeout: Duration,
}

impl SwimConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> SwimConfig {
        SwimConfig {
            known_peers: self.known_peers,
            ping_interval: self.ping_interval,
            ping_timeout: self.ping_timeout,
            ping_req_group_size: self.ping_req_group_size,
            ping_req_timeout: self.ping_req_timeout,
            suspect_timeout: self.suspect_timeout,
            dead_member_timeout: self.dead_member_timeout,
            gossip_max_send: self.gossip_max_send,
            gossip_max_size: self.gossip_max_size.min(MAX_GOSSIP_SIZE),
            join_timeout: self.join_timeout,
        }
    }

    /// The first entry is used as the join contact.
    pub fn with_known_peers<T>(mut self, known_peers: T) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        self.known_peers = known_peers
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        self
    }

    /// Sets the protocol period, the interval between probe rounds.
    pub fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }

    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    pub fn with_ping_req_group_size(mut self, ping_req_group_size: usize) -> Self {
        self.ping_req_group_size = ping_req_group_size;
        self
    }

    /// Bounded by what is left of the protocol period.
    pub fn with_ping_req_timeout(mut self, ping_req_timeout: Duration) -> Self {
        self.ping_req_timeout = ping_req_timeout;
        self
    }

    /// Sets how long a node stays suspected before it is declared dead.
    pub fn with_suspect_timeout(mut self, suspect_timeout: Duration) -> Self {
        self.suspect_timeout = suspect_timeout;
        self
    }

    /// Sets how long a dead node is remembered.
    pub fn with_dead_member_timeout(mut self, dead_member_timeout: Duration) -> Self {
        self.dead_member_timeout = dead_member_timeout;
        self
    }

    /// Sets how many outgoing messages carry each notification.
    pub fn with_gossip_max_send(mut self, gossip_max_send: usize) -> Self {
        self.gossip_max_send = gossip_max_send;
        self
    }

    /// Sets the byte budget for notifications attached to a single message.
    /// Capped at build time so a loaded datagram still fits the receive buffer.
    pub fn with_gossip_max_size(mut self, gossip_max_size: usize) -> Self {
        self.gossip_max_size = gossip_max_size;
        self
    }

    /// Sets the timeout for the membership snapshot transfer.
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }
}

impl Default for SwimConfigBuilder {
    fn default() -> Self {
        Self {
            known_peers: vec![],
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            ping_req_group_size: DEFAULT_PING_REQ_GROUP_SIZE,
            ping_req_timeout: DEFAULT_PING_REQ_TIMEOUT,
            suspect_timeout: DEFAULT_SUSPECT_TIMEOUT,
            dead_member_timeout: DEFAULT_DEAD_MEMBER_TIMEOUT,
            gossip_max_send: DEFAULT_GOSSIP_MAX_SEND,
            gossip_max_size: DEFAULT_GOSSIP_MAX_SIZE,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

/// Timing, fan-out and dissemination settings of a node.
#[derive(Clone, Debug)]
pub struct SwimConfig {
    known_peers: Vec<String>,
    ping_interval: Duration,
    ping_timeout: Duration,
    ping_req_group_size: usize,
    ping_req_timeout: Duration,
    suspect_timeout: Duration,
    dead_member_timeout: Duration,
    gossip_max_send: usize,
    gossip_max_size: usize,
    join_timeout: Duration,
}

impl SwimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SwimConfigBuilder {
        SwimConfigBuilder::new()
    }

    pub fn known_peers(&self) -> &[String] {
        &self.known_peers
    }

    /// Returns the protocol period.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    pub fn ping_req_group_size(&self) -> usize {
        self.ping_req_group_size
    }

    pub fn ping_req_timeout(&self) -> Duration {
        self.ping_req_timeout
    }

    /// Returns how long a node stays suspected before it is declared dead.
    pub fn suspect_timeout(&self) -> Duration {
        self.suspect_timeout
    }

    /// Returns how long a dead node is remembered.
    pub fn dead_member_timeout(&self) -> Duration {
        self.dead_member_timeout
    }

    pub fn gossip_max_send(&self) -> usize {
        self.gossip_max_send
    }

    pub fn gossip_max_size(&self) -> usize {
        self.gossip_max_size
    }

    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }
}

impl Default for SwimConfig {
    fn default() -> Self {
        SwimConfigBuilder::new().build()
    }
}

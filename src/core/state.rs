use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::api::config::SwimConfig;

use super::disseminate::Disseminator;
use super::event::Event;
use super::host::{HostId, HostRecord};
use super::member::{MemberState, MembershipList, Notification};

/// Everything a node mutates while running the protocol.
///
/// The membership table and the notification buffer change together, so they
/// live behind a single lock held by the node; every transition of the table
/// is queued for dissemination and published to subscribers in one step.
#[derive(Debug)]
pub(crate) struct SwimState {
    members: MembershipList,
    disseminator: Disseminator,
    tx: broadcast::Sender<Event>,
}

impl SwimState {
    pub(crate) fn new(
        local: HostRecord,
        config: &SwimConfig,
        tx: broadcast::Sender<Event>,
    ) -> Self {
        let members = MembershipList::new(
            local,
            config.suspect_timeout(),
            config.dead_member_timeout(),
        );
        let disseminator = Disseminator::new(config.gossip_max_send(), config.gossip_max_size());

        Self {
            members,
            disseminator,
            tx,
        }
    }

    pub(crate) fn members(&self) -> &MembershipList {
        &self.members
    }

    pub(crate) fn local(&self) -> HostRecord {
        self.members.local()
    }

    /// Merges `update` into the table. Returns `true` if it changed anything.
    pub(crate) fn apply(&mut self, update: &Notification, now: Instant) -> bool {
        let previous = self.members.get(&update.host.id()).map(|e| e.state());

        match self.members.upsert(update, now) {
            Some(notification) => {
                self.record(previous, notification);
                true
            }
            None => false,
        }
    }

    pub(crate) fn suspect(&mut self, id: &HostId, now: Instant) -> bool {
        let previous = self.members.get(id).map(|e| e.state());

        match self.members.suspect(id, now) {
            Some(notification) => {
                self.record(previous, notification);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_alive(&mut self, id: &HostId, now: Instant) -> bool {
        self.members.mark_alive(id, now)
    }

    /// Runs the per-round suspicion expiry. Returns the number of members declared dead.
    pub(crate) fn mark_suspect_timeouts(&mut self, now: Instant) -> usize {
        let notifications = self.members.mark_suspect_timeouts(now);
        let count = notifications.len();

        for notification in notifications {
            self.record(Some(MemberState::Suspect), notification);
        }

        count
    }

    pub(crate) fn next_probe_target(&mut self) -> Option<HostRecord> {
        self.members.next_probe_target()
    }

    pub(crate) fn random_subset(&self, amount: usize, excluding: &[HostId]) -> Vec<HostRecord> {
        self.members.random_subset(amount, excluding)
    }

    pub(crate) fn alive_members(&self) -> Vec<HostRecord> {
        self.members.random_subset(usize::MAX, &[])
    }

    pub(crate) fn snapshot(&self) -> Vec<HostRecord> {
        self.members.snapshot()
    }

    /// Notifications to piggyback on the next outgoing message.
    pub(crate) fn gossip(&mut self) -> Vec<Notification> {
        self.disseminator.pop()
    }

    pub(crate) fn pending_gossip(&self) -> usize {
        self.disseminator.len()
    }

    fn record(&mut self, previous: Option<MemberState>, notification: Notification) {
        let addr = self.local().socket_addr();

        if let Some(event) = Event::from_transition(previous, &notification) {
            tracing::info!("[{addr}] {event:?}");
            let _ = self.tx.send(event);
        }

        self.disseminator.push(notification);
        tracing::debug!(
            "[{addr}] {} is {:?} at incarnation {}, {} notifications pending",
            notification.host,
            notification.state,
            notification.incarnation,
            self.pending_gossip()
        );
    }
}

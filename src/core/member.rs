use std::collections::HashMap;
use std::time::Duration;

use rand::{seq::SliceRandom, thread_rng, Rng};
use tokio::time::Instant;

use super::host::{HostId, HostRecord};

pub type Incarnation = u32;

/// Failure-detection state of a member.
///
/// The declaration order is the precedence used when two claims carry
/// the same incarnation: `Alive < Suspect < Dead`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberState {
    Alive,
    Suspect,
    Dead,
}

impl MemberState {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            MemberState::Alive => 0,
            MemberState::Suspect => 1,
            MemberState::Dead => 2,
        }
    }

    pub(crate) fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(MemberState::Alive),
            1 => Some(MemberState::Suspect),
            2 => Some(MemberState::Dead),
            _ => None,
        }
    }
}

/// A fact about a member: `host` is in `state` as of `incarnation`.
///
/// Produced on every transition of the [`MembershipList`] and piggybacked
/// on outgoing protocol messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Notification {
    pub host: HostRecord,
    pub state: MemberState,
    pub incarnation: Incarnation,
}

impl Notification {
    pub fn new(host: HostRecord, state: MemberState, incarnation: Incarnation) -> Self {
        Self {
            host,
            state,
            incarnation,
        }
    }

    pub fn alive(host: HostRecord, incarnation: Incarnation) -> Self {
        Self::new(host, MemberState::Alive, incarnation)
    }

    pub fn suspect(host: HostRecord, incarnation: Incarnation) -> Self {
        Self::new(host, MemberState::Suspect, incarnation)
    }

    pub fn dead(host: HostRecord, incarnation: Incarnation) -> Self {
        Self::new(host, MemberState::Dead, incarnation)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MembershipEntry {
    host: HostRecord,
    state: MemberState,
    incarnation: Incarnation,
    since: Instant,
}

impl MembershipEntry {
    fn new(host: HostRecord, state: MemberState, incarnation: Incarnation, since: Instant) -> Self {
        Self {
            host,
            state,
            incarnation,
            since,
        }
    }

    pub fn host(&self) -> HostRecord {
        self.host
    }

    pub fn state(&self) -> MemberState {
        self.state
    }

    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    /// When the member entered its current state.
    pub fn since(&self) -> Instant {
        self.since
    }

    fn is_superseded_by(&self, update: &Notification) -> bool {
        (update.incarnation, update.state) > (self.incarnation, self.state)
    }
}

/// The node-local view of the cluster.
///
/// The local host is always present and `Alive`. Not synchronized: callers
/// serialize access (see `SwimState`).
#[derive(Clone, Debug)]
pub struct MembershipList {
    local: HostRecord,
    members: HashMap<HostId, MembershipEntry>,
    probe_order: Vec<HostId>,
    suspect_timeout: Duration,
    dead_member_timeout: Duration,
}

impl MembershipList {
    pub fn new(
        local: HostRecord,
        suspect_timeout: Duration,
        dead_member_timeout: Duration,
    ) -> Self {
        let entry = MembershipEntry::new(local, MemberState::Alive, 0, Instant::now());
        let members = HashMap::from_iter([(local.id(), entry)]);

        Self {
            local,
            members,
            probe_order: Vec::new(),
            suspect_timeout,
            dead_member_timeout,
        }
    }

    pub fn local(&self) -> HostRecord {
        self.local
    }

    /// The highest incarnation the local host has claimed for itself.
    pub fn incarnation(&self) -> Incarnation {
        self.members
            .get(&self.local.id())
            .map(|entry| entry.incarnation)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &HostId) -> Option<MembershipEntry> {
        self.members.get(id).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MembershipEntry> {
        self.members.values()
    }

    /// Applies `update` if it carries a higher `(incarnation, state)` pair
    /// than the recorded entry. Returns the notification to disseminate
    /// when the table changed.
    ///
    /// Claims about the local host never change its state: a `Suspect` or
    /// `Dead` claim at or above the local incarnation is refuted by bumping
    /// the incarnation past it.
    pub fn upsert(&mut self, update: &Notification, now: Instant) -> Option<Notification> {
        if update.host.id() == self.local.id() {
            return self.refute(update, now);
        }

        match self.members.get_mut(&update.host.id()) {
            Some(entry) => {
                if !entry.is_superseded_by(update) {
                    return None;
                }

                *entry = MembershipEntry::new(update.host, update.state, update.incarnation, now);
            }
            None => {
                let entry =
                    MembershipEntry::new(update.host, update.state, update.incarnation, now);
                self.members.insert(update.host.id(), entry);

                if update.state == MemberState::Alive {
                    self.schedule_probe(update.host.id());
                }
            }
        }

        Some(*update)
    }

    fn refute(&mut self, update: &Notification, now: Instant) -> Option<Notification> {
        let local = self.local;
        let entry = self
            .members
            .entry(local.id())
            .or_insert_with(|| MembershipEntry::new(local, MemberState::Alive, 0, now));

        match update.state {
            MemberState::Alive => {
                entry.incarnation = entry.incarnation.max(update.incarnation);
                None
            }
            MemberState::Suspect | MemberState::Dead => {
                if update.incarnation < entry.incarnation {
                    return None;
                }

                entry.incarnation = update.incarnation.saturating_add(1);
                entry.since = now;
                Some(Notification::alive(local, entry.incarnation))
            }
        }
    }

    /// Refreshes the timestamp of an `Alive` member after a successful probe.
    pub fn mark_alive(&mut self, id: &HostId, now: Instant) -> bool {
        match self.members.get_mut(id) {
            Some(entry) if entry.state == MemberState::Alive => {
                entry.since = now;
                true
            }
            _ => false,
        }
    }

    /// Moves `id` to `Suspect` at its current incarnation unless it is
    /// already `Suspect` or `Dead`.
    pub fn suspect(&mut self, id: &HostId, now: Instant) -> Option<Notification> {
        let entry = self.members.get(id)?;
        if entry.state != MemberState::Alive {
            return None;
        }

        let update = Notification::suspect(entry.host, entry.incarnation);
        self.upsert(&update, now)
    }

    /// Demotes members whose suspicion window elapsed to `Dead` and drops
    /// members that have been `Dead` for longer than the dead-member timeout.
    pub fn mark_suspect_timeouts(&mut self, now: Instant) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for entry in self.members.values_mut() {
            if entry.state == MemberState::Suspect
                && now.saturating_duration_since(entry.since) >= self.suspect_timeout
            {
                entry.state = MemberState::Dead;
                entry.since = now;
                notifications.push(Notification::dead(entry.host, entry.incarnation));
            }
        }

        let local_id = self.local.id();
        let dead_member_timeout = self.dead_member_timeout;
        self.members.retain(|id, entry| {
            *id == local_id
                || entry.state != MemberState::Dead
                || now.saturating_duration_since(entry.since) < dead_member_timeout
        });

        notifications
    }

    /// Up to `amount` distinct `Alive` members other than the local host and
    /// `excluding`, chosen uniformly at random.
    pub fn random_subset(&self, amount: usize, excluding: &[HostId]) -> Vec<HostRecord> {
        let mut candidates: Vec<HostRecord> = self
            .members
            .values()
            .filter(|entry| {
                entry.state == MemberState::Alive
                    && entry.host.id() != self.local.id()
                    && !excluding.contains(&entry.host.id())
            })
            .map(|entry| entry.host)
            .collect();

        candidates.shuffle(&mut thread_rng());
        candidates.truncate(amount);
        candidates
    }

    /// Next member to probe. Walks a shuffled list of `Alive` members and
    /// reshuffles once it is exhausted, so every member is probed once per sweep.
    pub fn next_probe_target(&mut self) -> Option<HostRecord> {
        for _ in 0..2 {
            while let Some(id) = self.probe_order.pop() {
                if let Some(entry) = self.members.get(&id) {
                    if entry.state == MemberState::Alive && id != self.local.id() {
                        return Some(entry.host);
                    }
                }
            }

            self.probe_order = self
                .random_subset(usize::MAX, &[])
                .into_iter()
                .map(|host| host.id())
                .collect();
        }

        None
    }

    /// Records of all `Alive` and `Suspect` members, the local host included.
    pub fn snapshot(&self) -> Vec<HostRecord> {
        self.members
            .values()
            .filter(|entry| entry.state != MemberState::Dead)
            .map(|entry| entry.host)
            .collect()
    }

    fn schedule_probe(&mut self, id: HostId) {
        if self.probe_order.is_empty() {
            return;
        }

        let index = thread_rng().gen_range(0..=self.probe_order.len());
        self.probe_order.insert(index, id);
    }
}

use super::host::HostRecord;
use super::member::{Incarnation, MemberState, Notification};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeJoined {
    pub member: HostRecord,
    pub incarnation: Incarnation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSuspected {
    pub suspect: HostRecord,
    pub incarnation: Incarnation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecovered {
    pub recovered: HostRecord,
    pub incarnation: Incarnation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeDeceased {
    pub deceased: HostRecord,
    pub incarnation: Incarnation,
}

/// Membership change observed by the local node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    NodeJoined(NodeJoined),
    NodeSuspected(NodeSuspected),
    NodeRecovered(NodeRecovered),
    NodeDeceased(NodeDeceased),
}

impl Event {
    /// Classifies a transition from `previous` to the state in `notification`.
    /// Returns `None` when the member stays `Alive` (an incarnation bump).
    pub(crate) fn from_transition(
        previous: Option<MemberState>,
        notification: &Notification,
    ) -> Option<Self> {
        let host = notification.host;
        let incarnation = notification.incarnation;

        match (previous, notification.state) {
            (None, MemberState::Alive) => Some(Event::new_node_joined(host, incarnation)),
            (Some(MemberState::Alive), MemberState::Alive) => None,
            (Some(_), MemberState::Alive) => Some(Event::new_node_recovered(host, incarnation)),
            (_, MemberState::Suspect) => Some(Event::new_node_suspected(host, incarnation)),
            (_, MemberState::Dead) => Some(Event::new_node_deceased(host, incarnation)),
        }
    }

    pub(crate) fn new_node_joined(member: HostRecord, incarnation: Incarnation) -> Self {
        Event::NodeJoined(NodeJoined {
            member,
            incarnation,
        })
    }

    pub(crate) fn new_node_suspected(suspect: HostRecord, incarnation: Incarnation) -> Self {
        Event::NodeSuspected(NodeSuspected {
            suspect,
            incarnation,
        })
    }

    pub(crate) fn new_node_recovered(recovered: HostRecord, incarnation: Incarnation) -> Self {
        Event::NodeRecovered(NodeRecovered {
            recovered,
            incarnation,
        })
    }

    pub(crate) fn new_node_deceased(deceased: HostRecord, incarnation: Incarnation) -> Self {
        Event::NodeDeceased(NodeDeceased {
            deceased,
            incarnation,
        })
    }

    /// The member this event is about.
    pub fn host(&self) -> HostRecord {
        match self {
            Event::NodeJoined(e) => e.member,
            Event::NodeSuspected(e) => e.suspect,
            Event::NodeRecovered(e) => e.recovered,
            Event::NodeDeceased(e) => e.deceased,
        }
    }
}

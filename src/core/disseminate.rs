use std::collections::BinaryHeap;

use super::member::Notification;
use super::message::NOTIFICATION_LEN;

#[derive(Debug)]
struct GossipHeapEntry {
    notification: Notification,
    num_send: usize,
    seq: u64,
}

impl GossipHeapEntry {
    fn new(notification: Notification, seq: u64) -> Self {
        Self {
            notification,
            num_send: 0,
            seq,
        }
    }
}

impl PartialEq for GossipHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.num_send == other.num_send && self.seq == other.seq
    }
}

impl Eq for GossipHeapEntry {}

// Least-sent entries first; among equals, the oldest first.
impl Ord for GossipHeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .num_send
            .cmp(&self.num_send)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for GossipHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded buffer of notifications waiting to be piggybacked.
///
/// Each notification is handed out at most `max_send` times, and a single
/// call to [`Disseminator::pop`] never returns more than `max_size` encoded bytes.
#[derive(Debug)]
pub(crate) struct Disseminator {
    queue: BinaryHeap<GossipHeapEntry>,
    next_seq: u64,
    max_send: usize,
    max_size: usize,
}

impl Disseminator {
    pub(crate) fn new(max_send: usize, max_size: usize) -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
            max_send,
            max_size,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Queues `notification`, replacing any older one about the same host.
    pub(crate) fn push(&mut self, notification: Notification) {
        if self.max_send == 0 {
            return;
        }

        let id = notification.host.id();
        self.queue.retain(|entry| entry.notification.host.id() != id);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(GossipHeapEntry::new(notification, seq));
    }

    /// Selects the notifications to attach to the next outgoing message.
    pub(crate) fn pop(&mut self) -> Vec<Notification> {
        let mut gossip = Vec::new();
        let mut requeue = Vec::new();
        let mut current_size = 0;

        while current_size + NOTIFICATION_LEN <= self.max_size {
            let Some(mut entry) = self.queue.pop() else {
                break;
            };

            current_size += NOTIFICATION_LEN;
            entry.num_send += 1;
            gossip.push(entry.notification);

            if entry.num_send < self.max_send {
                requeue.push(entry);
            }
        }

        self.queue.extend(requeue);
        gossip
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::core::{
        host::{HostId, HostRecord},
        member::Notification,
        message::NOTIFICATION_LEN,
    };

    use super::Disseminator;

    fn host(port: u16) -> HostRecord {
        HostRecord::new(HostId::random(), Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn test_disseminator_pop() {
        let mut disseminator = Disseminator::new(1, 128);
        let n1 = Notification::alive(host(8001), 0);
        let n2 = Notification::alive(host(8002), 0);
        disseminator.push(n1);
        disseminator.push(n2);

        let result = disseminator.pop();

        assert_eq!(result, vec![n1, n2]);
        assert_eq!(disseminator.len(), 0);
        assert!(disseminator.pop().is_empty());
    }

    #[test]
    fn test_disseminator_push_replaces_same_host() {
        let mut disseminator = Disseminator::new(5, 128);
        let b = host(8001);
        disseminator.push(Notification::alive(b, 0));
        disseminator.push(Notification::suspect(b, 0));

        assert_eq!(disseminator.len(), 1);
        assert_eq!(disseminator.pop(), vec![Notification::suspect(b, 0)]);
    }

    #[test]
    fn test_disseminator_respects_max_send() {
        let mut disseminator = Disseminator::new(3, 128);
        let n = Notification::dead(host(8001), 4);
        disseminator.push(n);

        for _ in 0..3 {
            assert_eq!(disseminator.pop(), vec![n]);
        }
        assert!(disseminator.pop().is_empty());
    }

    #[test]
    fn test_disseminator_respects_max_size_round_robin() {
        let mut disseminator = Disseminator::new(10, NOTIFICATION_LEN * 2);
        let n1 = Notification::alive(host(8001), 0);
        let n2 = Notification::alive(host(8002), 0);
        let n3 = Notification::alive(host(8003), 0);
        disseminator.push(n1);
        disseminator.push(n2);
        disseminator.push(n3);

        assert_eq!(disseminator.pop(), vec![n1, n2]);
        // n3 has been sent the least, it leads the next message
        assert_eq!(disseminator.pop(), vec![n3, n1]);
        assert_eq!(disseminator.pop(), vec![n2, n3]);
    }
}

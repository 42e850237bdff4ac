use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::random;
use tokio::sync::oneshot;

use super::host::HostId;
use super::message::Sequence;

/// How a single wait on an outstanding probe ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    Acked,
    TimedOut,
}

#[derive(Debug)]
struct PendingAck {
    target: HostId,
    tx: oneshot::Sender<()>,
}

/// Outstanding probes, keyed by the sequence number carried in PING,
/// PING-REQ and ACK messages.
#[derive(Debug)]
pub(crate) struct ProbeRegistry {
    next_seq: AtomicU32,
    pending: DashMap<Sequence, PendingAck>,
}

impl ProbeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: AtomicU32::new(random()),
            pending: DashMap::new(),
        }
    }

    /// Allocates a sequence number for a probe of `target`.
    pub(crate) fn register(&self, target: HostId) -> (Sequence, oneshot::Receiver<()>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, PendingAck { target, tx });

        (seq, rx)
    }

    /// Completes the probe waiting on `seq`. Returns the probed host, or
    /// `None` if no probe is waiting (late or unknown ACK).
    pub(crate) fn resolve(&self, seq: Sequence) -> Option<HostId> {
        let (_, pending) = self.pending.remove(&seq)?;
        let _ = pending.tx.send(());

        Some(pending.target)
    }

    pub(crate) fn cancel(&self, seq: Sequence) {
        self.pending.remove(&seq);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Waits for the ACK behind `rx` for at most `timeout`.
///
/// Takes the receiver by reference so a probe can keep waiting on the same
/// sequence number across the direct and indirect phase.
pub(crate) async fn wait_for_ack(
    rx: &mut oneshot::Receiver<()>,
    timeout: Duration,
) -> ProbeOutcome {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(())) => ProbeOutcome::Acked,
        _ => ProbeOutcome::TimedOut,
    }
}

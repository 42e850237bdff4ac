use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::config::SwimConfig;

use super::host::HostRecord;
use super::member::MemberState;
use super::message::Sequence;
use super::probe::{wait_for_ack, ProbeOutcome, ProbeRegistry};
use super::sender::MessageSender;
use super::state::SwimState;
use super::transport::TransportLayer;

/// Progress of the probe started in the current protocol round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FailureDetectorState {
    Idle,
    AwaitingDirectAck { target: HostRecord, seq: Sequence },
    AwaitingIndirectAck { target: HostRecord, seq: Sequence },
    Resolved { target: HostRecord, state: MemberState },
}

#[derive(Debug)]
pub(crate) struct FailureDetector<T: TransportLayer> {
    addr: SocketAddr,
    config: Arc<SwimConfig>,
    state: Arc<RwLock<FailureDetectorState>>,
    swim_state: Arc<Mutex<SwimState>>,
    probes: Arc<ProbeRegistry>,
    sender: MessageSender<T>,
}

impl<T: TransportLayer> Clone for FailureDetector<T> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            config: self.config.clone(),
            state: self.state.clone(),
            swim_state: self.swim_state.clone(),
            probes: self.probes.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T: TransportLayer> FailureDetector<T> {
    pub(crate) fn new(
        addr: SocketAddr,
        config: Arc<SwimConfig>,
        swim_state: Arc<Mutex<SwimState>>,
        probes: Arc<ProbeRegistry>,
        sender: MessageSender<T>,
    ) -> Self {
        let state = Arc::new(RwLock::new(FailureDetectorState::Idle));

        Self {
            addr,
            config,
            state,
            swim_state,
            probes,
            sender,
        }
    }

    #[cfg(test)]
    pub(crate) async fn state(&self) -> FailureDetectorState {
        let state = self.state.read().await;
        (*state).clone()
    }

    /// Starts a probe round every protocol period, forever.
    pub(crate) async fn run(&self) {
        let mut interval = tokio::time::interval(self.config.ping_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.run_round().await;
        }
    }

    /// Expires suspicions, then probes the next target, if any.
    pub(crate) async fn run_round(&self) -> Option<MemberState> {
        let started = Instant::now();

        let target = {
            let mut swim_state = self.swim_state.lock().await;
            swim_state.mark_suspect_timeouts(started);
            swim_state.next_probe_target()
        };

        match target {
            Some(target) => Some(self.probe(target, started).await),
            None => {
                self.set_state(FailureDetectorState::Idle).await;
                None
            }
        }
    }

    /// Runs the direct and, if needed, the indirect probe of `target`.
    pub(crate) async fn probe(&self, target: HostRecord, started: Instant) -> MemberState {
        let (seq, mut rx) = self.probes.register(target.id());

        self.sender.send_ping(seq, &target).await;
        self.set_state(FailureDetectorState::AwaitingDirectAck { target, seq })
            .await;

        if wait_for_ack(&mut rx, self.config.ping_timeout()).await == ProbeOutcome::Acked {
            return self.resolve_alive(target).await;
        }

        tracing::debug!("[{}] no ACK from {}, probing indirectly", self.addr, target);
        self.send_ping_req(seq, &target).await;
        self.set_state(FailureDetectorState::AwaitingIndirectAck { target, seq })
            .await;

        // a late direct ACK resolves the same sequence, so it counts as well
        let remaining = self.config.ping_interval().saturating_sub(started.elapsed());
        let timeout = self.config.ping_req_timeout().min(remaining);
        let outcome = wait_for_ack(&mut rx, timeout).await;
        self.probes.cancel(seq);

        match outcome {
            ProbeOutcome::Acked => self.resolve_alive(target).await,
            ProbeOutcome::TimedOut => {
                tracing::debug!(
                    "[{}] probe of {} timed out, {} probes outstanding",
                    self.addr,
                    target,
                    self.probes.len()
                );
                self.swim_state
                    .lock()
                    .await
                    .suspect(&target.id(), Instant::now());
                self.set_state(FailureDetectorState::Resolved {
                    target,
                    state: MemberState::Suspect,
                })
                .await;

                MemberState::Suspect
            }
        }
    }

    /// Asks up to `ping_req_group_size` members to probe `target` on our behalf.
    async fn send_ping_req(&self, seq: Sequence, target: &HostRecord) -> usize {
        let relays = self
            .swim_state
            .lock()
            .await
            .random_subset(self.config.ping_req_group_size(), &[target.id()]);

        for relay in &relays {
            self.sender.send_ping_req(seq, target, relay).await;
        }

        relays.len()
    }

    async fn resolve_alive(&self, target: HostRecord) -> MemberState {
        self.swim_state
            .lock()
            .await
            .mark_alive(&target.id(), Instant::now());
        self.set_state(FailureDetectorState::Resolved {
            target,
            state: MemberState::Alive,
        })
        .await;

        MemberState::Alive
    }

    async fn set_state(&self, next: FailureDetectorState) {
        let mut state = self.state.write().await;
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{broadcast, Mutex};
    use tokio::time::Instant;

    use crate::{
        api::config::SwimConfig,
        core::{
            host::{HostId, HostRecord},
            member::{MemberState, Notification},
            message::Action,
            probe::ProbeRegistry,
            sender::MessageSender,
            state::SwimState,
        },
        test_utils::mocks::MockUdpSocket,
    };

    use super::{FailureDetector, FailureDetectorState};

    const PING_TIMEOUT: Duration = Duration::from_millis(100);
    const PING_REQ_TIMEOUT: Duration = Duration::from_millis(200);

    struct Fixture {
        detector: FailureDetector<MockUdpSocket>,
        socket: Arc<MockUdpSocket>,
        probes: Arc<ProbeRegistry>,
        swim_state: Arc<Mutex<SwimState>>,
        b: HostRecord,
    }

    fn host(port: u16) -> HostRecord {
        HostRecord::new(HostId::random(), Ipv4Addr::LOCALHOST, port)
    }

    async fn create_failure_detector(relays: u16) -> Fixture {
        let local = host(8000);
        let config = Arc::new(
            SwimConfig::builder()
                .with_ping_interval(Duration::from_millis(500))
                .with_ping_timeout(PING_TIMEOUT)
                .with_ping_req_timeout(PING_REQ_TIMEOUT)
                .with_ping_req_group_size(2)
                .with_suspect_timeout(Duration::from_secs(1))
                .with_gossip_max_send(0)
                .build(),
        );
        let (tx, _) = broadcast::channel(32);
        let swim_state = Arc::new(Mutex::new(SwimState::new(local, &config, tx)));
        let socket = Arc::new(MockUdpSocket::new());
        let probes = Arc::new(ProbeRegistry::new());
        let sender = MessageSender::new(local, socket.clone(), swim_state.clone());

        let b = host(8001);
        {
            let mut state = swim_state.lock().await;
            state.apply(&Notification::alive(b, 0), Instant::now());
            for port in 0..relays {
                state.apply(&Notification::alive(host(9000 + port), 0), Instant::now());
            }
        }

        let detector = FailureDetector::new(
            local.socket_addr(),
            config,
            swim_state.clone(),
            probes.clone(),
            sender,
        );

        Fixture {
            detector,
            socket,
            probes,
            swim_state,
            b,
        }
    }

    /// Resolves the first PING sent to `target` after `delay`.
    fn ack_after(fixture: &Fixture, delay: Duration) {
        let socket = fixture.socket.clone();
        let probes = fixture.probes.clone();
        let target = fixture.b.socket_addr();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let transmitted = socket.transmitted().await;
            let seq = transmitted.iter().find_map(|(message, to)| match message.action {
                Action::Ping { seq } if *to == target => Some(seq),
                _ => None,
            });
            if let Some(seq) = seq {
                probes.resolve(seq);
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_direct_ack_keeps_member_alive() {
        let fixture = create_failure_detector(0).await;
        ack_after(&fixture, PING_TIMEOUT / 2);

        let result = fixture.detector.probe(fixture.b, Instant::now()).await;
        assert_eq!(result, MemberState::Alive);

        let state = fixture.detector.state().await;
        assert_eq!(
            state,
            FailureDetectorState::Resolved {
                target: fixture.b,
                state: MemberState::Alive
            }
        );

        let entry = fixture.swim_state.lock().await.members().get(&fixture.b.id()).unwrap();
        assert_eq!(entry.state(), MemberState::Alive);
        assert_eq!(entry.incarnation(), 0);

        // no PING-REQ was needed
        let transmitted = fixture.socket.transmitted().await;
        assert_eq!(transmitted.len(), 1);
        assert!(matches!(transmitted[0].0.action, Action::Ping { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_indirect_ack_suppresses_failure() {
        let fixture = create_failure_detector(2).await;
        ack_after(&fixture, PING_TIMEOUT + PING_REQ_TIMEOUT / 2);

        let result = fixture.detector.probe(fixture.b, Instant::now()).await;
        assert_eq!(result, MemberState::Alive);

        let transmitted = fixture.socket.transmitted().await;
        let ping_seq = match transmitted[0].0.action {
            Action::Ping { seq } => seq,
            other => panic!("unexpected {other:?}"),
        };
        let ping_reqs: Vec<_> = transmitted[1..]
            .iter()
            .map(|(message, to)| (message.action, *to))
            .collect();
        assert_eq!(ping_reqs.len(), 2);
        for (action, to) in ping_reqs {
            assert_eq!(
                action,
                Action::PingReq {
                    seq: ping_seq,
                    target: fixture.b
                }
            );
            assert_ne!(to, fixture.b.socket_addr());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_silent_member_becomes_suspect() {
        let fixture = create_failure_detector(3).await;

        let result = fixture.detector.probe(fixture.b, Instant::now()).await;
        assert_eq!(result, MemberState::Suspect);

        let entry = fixture.swim_state.lock().await.members().get(&fixture.b.id()).unwrap();
        assert_eq!(entry.state(), MemberState::Suspect);
        assert_eq!(fixture.probes.len(), 0);

        // relays are capped at the group size
        let transmitted = fixture.socket.transmitted().await;
        let ping_reqs = transmitted
            .iter()
            .filter(|(message, _)| matches!(message.action, Action::PingReq { .. }))
            .count();
        assert_eq!(ping_reqs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_suspect_then_dead_after_window() {
        let fixture = create_failure_detector(0).await;

        assert_eq!(fixture.detector.run_round().await, Some(MemberState::Suspect));
        // the only other member is suspected, nothing left to probe
        assert_eq!(fixture.detector.run_round().await, None);
        assert_eq!(fixture.detector.state().await, FailureDetectorState::Idle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        fixture.detector.run_round().await;

        let entry = fixture.swim_state.lock().await.members().get(&fixture.b.id()).unwrap();
        assert_eq!(entry.state(), MemberState::Dead);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_indirect_wait_bounded_by_protocol_period() {
        let fixture = create_failure_detector(0).await;
        let started = Instant::now() - Duration::from_millis(450);

        fixture.detector.probe(fixture.b, started).await;

        // 100ms direct wait plus the 50ms left of the 500ms period
        assert!(started.elapsed() < Duration::from_millis(450) + PING_TIMEOUT + PING_REQ_TIMEOUT);
    }
}

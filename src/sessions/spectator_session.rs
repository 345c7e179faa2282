use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};
use web_time::Instant;

use crate::board::BoardLayout;
use crate::checksum::mirror_checksum;
use crate::liveness::{LivenessClock, LivenessMonitor, LivenessState, LivenessTransition};
use crate::mirror::GameMirror;
use crate::network::decoder::{decode, decode_bytes, DecodeError};
use crate::network::messages::HostMessage;
use crate::network::session_stats::SessionStats;
use crate::reconciler::{MirrorChange, Reconciler, Reconciliation};
use crate::room_store::RoomId;
use crate::sessions::config::LivenessConfig;
use crate::sessions::event_drain::EventDrain;
use crate::sessions::observer::SpectatorObserver;
use crate::telemetry::{
    report_to_observer, ProtocolViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{
    report_violation_to, ConnectionStatus, LadderError, SpectatorEvent, Transport,
    TransportEvent,
};

/// Lifecycle of the data channel as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// No `Open` seen yet.
    Pending,
    Open,
    /// Closed or failed after having been open (or before ever opening).
    Closed,
}

/// [`SpectatorSession`] watches one host over one transport.
///
/// The session owns the mirror, the liveness clock and the liveness monitor for
/// that connection; nothing is shared with other sessions. It is driven by calling
/// [`poll_remote`](Self::poll_remote) (or [`poll_at`](Self::poll_at) with an
/// explicit time) regularly, at least as often as the liveness poll interval.
///
/// Inbound messages are handled strictly in delivery order, and every mirror change
/// is published to the observer and the event queue before the next message is
/// looked at.
pub struct SpectatorSession {
    transport: Box<dyn Transport>,
    reconciler: Reconciler,
    clock: LivenessClock,
    monitor: LivenessMonitor,
    liveness_config: LivenessConfig,
    board: BoardLayout,
    channel: ChannelState,
    status: ConnectionStatus,
    event_queue: VecDeque<SpectatorEvent>,
    max_event_queue_size: usize,
    stats: SessionStats,
    room_id: Option<RoomId>,
    observer: Option<Box<dyn SpectatorObserver>>,
    /// Optional observer for protocol violations.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
    shut_down: bool,
}

impl SpectatorSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        liveness_config: LivenessConfig,
        board: BoardLayout,
        max_event_queue_size: usize,
        room_id: Option<RoomId>,
        observer: Option<Box<dyn SpectatorObserver>>,
        violation_observer: Option<Arc<dyn ViolationObserver>>,
        now: Instant,
    ) -> Self {
        Self {
            transport,
            reconciler: Reconciler::new(),
            clock: LivenessClock::new(now),
            monitor: LivenessMonitor::new(liveness_config, now),
            liveness_config,
            board,
            channel: ChannelState::Pending,
            status: ConnectionStatus::Disconnected,
            event_queue: VecDeque::new(),
            // Use at least 1 to keep the newest event
            max_event_queue_size: max_event_queue_size.max(1),
            stats: SessionStats::new(),
            room_id,
            observer,
            violation_observer,
            shut_down: false,
        }
    }

    /// Receives everything the transport has delivered, handles it in order, then
    /// runs the liveness poll if one is due. Should be called periodically.
    pub fn poll_remote(&mut self) {
        self.poll_at(Instant::now());
    }

    /// Like [`poll_remote`](Self::poll_remote), with `now` as the current time.
    pub fn poll_at(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        for event in self.transport.poll_events() {
            self.handle_transport_event(event, now);
        }
        self.poll_liveness(now);
    }

    /// Handles a single transport event received at `now`.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        if self.shut_down {
            return;
        }
        match event {
            TransportEvent::Open => self.on_open(now),
            TransportEvent::Close => {
                debug!("host channel closed");
                self.channel = ChannelState::Closed;
                self.refresh_status();
            },
            TransportEvent::Error { reason } => {
                report_violation_to!(
                    &self.violation_observer,
                    ViolationSeverity::Error,
                    ViolationKind::Transport,
                    "host channel failed: {}",
                    reason
                );
                self.channel = ChannelState::Closed;
                self.refresh_status();
            },
            TransportEvent::Data(record) => self.handle_record(&record, now),
            TransportEvent::RawData(bytes) => {
                let decoded = decode_bytes(&bytes);
                self.handle_decoded(decoded, now);
            },
        }
    }

    /// Decodes and applies one structured host record received at `now`.
    pub fn handle_record(&mut self, record: &Value, now: Instant) {
        if self.shut_down {
            return;
        }
        let decoded = decode(record);
        self.handle_decoded(decoded, now);
    }

    /// Applies one already-decoded message received at `now`.
    ///
    /// Any message counts as host traffic, including kinds this client ignores.
    pub fn handle_message(&mut self, message: HostMessage, now: Instant) {
        if self.shut_down {
            return;
        }
        self.clock.touch(now);
        self.stats.messages_accepted += 1;
        trace!(kind = message.kind_name(), "host message");
        let outcome = self.reconciler.apply(message);
        self.publish(outcome);
    }

    /// Runs the liveness poll if one is due at `now`.
    ///
    /// Returns the transition the poll observed, if any.
    pub fn poll_liveness(&mut self, now: Instant) -> Option<LivenessTransition> {
        if self.shut_down {
            return None;
        }
        let transition =
            self.monitor
                .poll(now, &self.clock, self.channel == ChannelState::Open)?;
        match transition {
            LivenessTransition::WentStale { silent_for } => {
                report_violation_to!(
                    &self.violation_observer,
                    ViolationSeverity::Warning,
                    ViolationKind::Liveness,
                    "no host traffic for {}ms (timeout {}ms)",
                    silent_for.as_millis(),
                    self.liveness_config.timeout.as_millis()
                );
                self.push_event(SpectatorEvent::HostStale {
                    silent_for_ms: silent_for.as_millis(),
                });
            },
            LivenessTransition::Resumed => {
                debug!("host traffic resumed");
                self.push_event(SpectatorEvent::HostResumed);
            },
        }
        self.refresh_status();
        Some(transition)
    }

    /// Stops the liveness poll and ignores all further input.
    ///
    /// Shutting down is final: the status becomes `Disconnected` and stays so.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        debug!("shutting down spectator session");
        self.monitor.cancel();
        self.channel = ChannelState::Closed;
        self.refresh_status();
        self.shut_down = true;
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Read-only snapshot of the mirror.
    #[must_use]
    pub const fn mirror(&self) -> &GameMirror {
        self.reconciler.mirror()
    }

    /// Deterministic fingerprint of the current mirror.
    pub fn mirror_checksum(&self) -> Result<u128, LadderError> {
        Ok(mirror_checksum(self.reconciler.mirror())?)
    }

    /// Current derived connection status.
    #[must_use]
    pub const fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the join prompt should be visible.
    #[must_use]
    pub const fn join_prompt_visible(&self) -> bool {
        self.status.join_prompt_visible()
    }

    /// Current liveness state.
    #[must_use]
    pub const fn liveness_state(&self) -> LivenessState {
        self.monitor.state()
    }

    /// When the host last produced an accepted message.
    #[must_use]
    pub const fn last_signal(&self) -> Instant {
        self.clock.last_signal()
    }

    /// When the next liveness poll is due, or `None` once shut down.
    #[must_use]
    pub const fn next_liveness_poll(&self) -> Option<Instant> {
        self.monitor.schedule().next_due()
    }

    /// Liveness settings in use.
    pub const fn liveness_config(&self) -> LivenessConfig {
        self.liveness_config
    }

    /// Board geometry for the presentation layer.
    #[must_use]
    pub const fn board(&self) -> &BoardLayout {
        &self.board
    }

    /// Records that the presentation layer already built the board.
    pub fn mark_board_materialized(&mut self) {
        self.reconciler.mark_board_materialized();
    }

    /// The room this session was started for, if any.
    #[must_use]
    pub const fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Counters for everything received so far.
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Returns all events that happened since last queried for events. If the number of
    /// stored events exceeds the configured maximum, the oldest events will be discarded.
    pub fn events(&mut self) -> EventDrain<'_> {
        EventDrain::from_drain(self.event_queue.drain(..))
    }

    /// Returns a reference to the violation observer, if one was configured.
    #[must_use]
    pub fn violation_observer(&self) -> Option<&Arc<dyn ViolationObserver>> {
        self.violation_observer.as_ref()
    }

    fn on_open(&mut self, now: Instant) {
        if self.channel == ChannelState::Closed {
            // A fresh connection never shows state from the previous one.
            debug!("host channel reopened, discarding mirror");
            self.reconciler.reset();
        }
        self.channel = ChannelState::Open;
        self.clock.reset(now);
        self.monitor.reset(now);
        self.refresh_status();
    }

    fn handle_decoded(&mut self, decoded: Result<HostMessage, DecodeError>, now: Instant) {
        match decoded {
            Ok(message) => self.handle_message(message, now),
            Err(err) => {
                self.stats.decode_failures += 1;
                let mut violation = ProtocolViolation::new(
                    ViolationSeverity::Warning,
                    ViolationKind::Decode,
                    format!("dropping host record: {err}"),
                    concat!(file!(), ":", line!()),
                );
                if let Some(kind) = err.kind() {
                    violation = violation.with_context("kind", kind);
                }
                report_to_observer(self.violation_observer.as_ref(), &violation);
            },
        }
    }

    fn publish(&mut self, outcome: Reconciliation) {
        match outcome {
            Reconciliation::MirrorChanged {
                change,
                board_required,
            } => {
                match change {
                    MirrorChange::Replaced { .. } => self.stats.full_syncs += 1,
                    MirrorChange::Position { .. } => self.stats.position_patches += 1,
                    MirrorChange::ViewerCount { .. } => self.stats.viewer_counts += 1,
                }
                if board_required {
                    if let Some(observer) = self.observer.as_mut() {
                        observer.on_board_required();
                    }
                    self.push_event(SpectatorEvent::BoardRequired);
                }
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_mirror_updated(self.reconciler.mirror(), &change);
                }
                self.push_event(SpectatorEvent::MirrorUpdated { change });
            },
            Reconciliation::Forward(event) => {
                self.stats.presentation_events += 1;
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_presentation_event(&event);
                }
                self.push_event(SpectatorEvent::Presentation(event));
            },
            Reconciliation::LivenessOnly => self.stats.heartbeats += 1,
            Reconciliation::StaleReference { .. } => self.stats.stale_patches += 1,
            Reconciliation::AwaitingFullSync => self.stats.patches_before_sync += 1,
            Reconciliation::Dropped { .. } => self.stats.unrecognized += 1,
        }
    }

    fn refresh_status(&mut self) {
        let status = if self.channel == ChannelState::Open
            && self.monitor.state() == LivenessState::Live
        {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        if status == self.status {
            return;
        }
        debug!(?status, "connection status changed");
        self.status = status;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_connection_status(status);
        }
        self.push_event(SpectatorEvent::StatusChanged { status });
    }

    fn push_event(&mut self, event: SpectatorEvent) {
        self.event_queue.push_back(event);
        // Drop the oldest events until the queue fits again.
        while self.event_queue.len() > self.max_event_queue_size {
            self.event_queue.pop_front();
        }
    }
}

impl std::fmt::Debug for SpectatorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectatorSession")
            .field("status", &self.status)
            .field("channel", &self.channel)
            .field("liveness", &self.monitor.state())
            .field("players", &self.reconciler.mirror().players.len())
            .field("pending_events", &self.event_queue.len())
            .field("room_id", &self.room_id)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::telemetry::CollectingObserver;
    use serde_json::json;
    use web_time::Duration;

    struct NoTransport;

    impl Transport for NoTransport {
        fn poll_events(&mut self) -> Vec<TransportEvent> {
            Vec::new()
        }
    }

    fn session(now: Instant, queue: usize) -> (SpectatorSession, Arc<CollectingObserver>) {
        let collector = Arc::new(CollectingObserver::new());
        let session = SpectatorSession::new(
            Box::new(NoTransport),
            LivenessConfig::default(),
            BoardLayout::standard(),
            queue,
            None,
            None,
            Some(collector.clone()),
            now,
        );
        (session, collector)
    }

    #[test]
    fn starts_disconnected_with_empty_mirror() {
        let (s, _) = session(Instant::now(), 16);
        assert_eq!(s.connection_status(), ConnectionStatus::Disconnected);
        assert!(s.join_prompt_visible());
        assert!(s.mirror().is_empty());
    }

    #[test]
    fn decode_failure_is_counted_and_reported() {
        let t0 = Instant::now();
        let (mut s, collector) = session(t0, 16);
        s.handle_transport_event(TransportEvent::Open, t0);
        s.handle_record(&json!({ "type": "SYNC_POSITION" }), t0 + Duration::from_secs(3));
        assert_eq!(s.stats().decode_failures, 1);
        assert_eq!(s.stats().messages_accepted, 0);
        let violations = collector.violations_of_kind(ViolationKind::Decode);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].context.get("kind").map(String::as_str),
            Some("SYNC_POSITION")
        );
        // Rejected records are not host traffic.
        assert_eq!(s.last_signal(), t0);
    }

    #[test]
    fn untagged_record_is_reported_without_kind() {
        let t0 = Instant::now();
        let (mut s, collector) = session(t0, 16);
        s.handle_transport_event(TransportEvent::Open, t0);
        s.handle_record(&json!([1, 2, 3]), t0);
        let violations = collector.violations_of_kind(ViolationKind::Decode);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].context.is_empty());
    }

    #[test]
    fn event_queue_drops_oldest() {
        let t0 = Instant::now();
        let (mut s, _) = session(t0, 2);
        s.handle_transport_event(TransportEvent::Open, t0);
        for count in [1, 2, 3] {
            s.handle_record(&json!({ "type": "VIEWER_COUNT", "count": count }), t0);
        }
        let events: Vec<_> = s.events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            SpectatorEvent::MirrorUpdated {
                change: MirrorChange::ViewerCount {
                    previous: Some(2),
                    current: 3
                }
            }
        );
    }

    #[test]
    fn transport_error_is_reported_and_disconnects() {
        let t0 = Instant::now();
        let (mut s, collector) = session(t0, 16);
        s.handle_transport_event(TransportEvent::Open, t0);
        assert!(s.connection_status().is_connected());
        s.handle_transport_event(
            TransportEvent::Error {
                reason: "ice failed".to_owned(),
            },
            t0,
        );
        assert_eq!(s.connection_status(), ConnectionStatus::Disconnected);
        let violations = collector.violations_of_kind(ViolationKind::Transport);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, ViolationSeverity::Error);
        assert!(violations[0].message.contains("ice failed"));
    }

    #[test]
    fn shutdown_is_final() {
        let t0 = Instant::now();
        let (mut s, _) = session(t0, 16);
        s.handle_transport_event(TransportEvent::Open, t0);
        s.shutdown();
        assert!(s.is_shut_down());
        assert_eq!(s.next_liveness_poll(), None);
        assert_eq!(s.connection_status(), ConnectionStatus::Disconnected);

        s.handle_transport_event(TransportEvent::Open, t0);
        s.handle_record(&json!({ "type": "HEARTBEAT" }), t0);
        assert_eq!(s.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(s.stats().heartbeats, 0);
    }
}

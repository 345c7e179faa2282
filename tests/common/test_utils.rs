//! Shared test utilities for integration tests.
//!
//! This module provides a transport that tests can script while a session owns it,
//! an observer that records every callback, and helpers for building sessions on a
//! fixed start time.
//!
//! # Scripting a transport
//!
//! ```ignore
//! let transport = ScriptedTransport::new();
//! let mut session = start_session(transport.clone(), t0);
//! transport.push(TransportEvent::Open);
//! session.poll_at(t0);
//! ```

#![allow(dead_code, clippy::expect_used, clippy::indexing_slicing)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ladderwatch::{
    ConnectionStatus, GameMirror, LivenessConfig, MirrorChange, PresentationEvent,
    SessionBuilder, SpectatorObserver, SpectatorSession, Transport, TransportEvent,
};
use parking_lot::Mutex;
use serde_json::Value;
use web_time::Instant;

/// Default liveness timeout, matching [`LivenessConfig::default`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

// ============================================================================
// Scripted Transport
// ============================================================================

/// A transport whose event queue stays reachable after the session takes ownership.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    queue: Arc<Mutex<VecDeque<TransportEvent>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: TransportEvent) {
        self.queue.lock().push_back(event);
    }

    pub fn open(&self) {
        self.push(TransportEvent::Open);
    }

    pub fn close(&self) {
        self.push(TransportEvent::Close);
    }

    pub fn data(&self, record: Value) {
        self.push(TransportEvent::Data(record));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.queue.lock().drain(..).collect()
    }
}

// ============================================================================
// Recording Observer
// ============================================================================

/// One observer callback, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedCall {
    BoardRequired,
    MirrorUpdated {
        mirror: GameMirror,
        change: MirrorChange,
    },
    Presentation(PresentationEvent),
    Status(ConnectionStatus),
}

/// Records every callback. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    calls: Arc<Mutex<Vec<ObservedCall>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ObservedCall> {
        self.calls.lock().clone()
    }

    /// Every mirror the presentation layer was shown, in order.
    pub fn mirrors(&self) -> Vec<GameMirror> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ObservedCall::MirrorUpdated { mirror, .. } => Some(mirror.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ObservedCall::Status(status) => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl SpectatorObserver for RecordingObserver {
    fn on_board_required(&mut self) {
        self.calls.lock().push(ObservedCall::BoardRequired);
    }

    fn on_mirror_updated(&mut self, mirror: &GameMirror, change: &MirrorChange) {
        self.calls.lock().push(ObservedCall::MirrorUpdated {
            mirror: mirror.clone(),
            change: *change,
        });
    }

    fn on_presentation_event(&mut self, event: &PresentationEvent) {
        self.calls
            .lock()
            .push(ObservedCall::Presentation(event.clone()));
    }

    fn on_connection_status(&mut self, status: ConnectionStatus) {
        self.calls.lock().push(ObservedCall::Status(status));
    }
}

// ============================================================================
// Session Helpers
// ============================================================================

/// Starts a session with default configuration at `start`.
pub fn start_session(transport: ScriptedTransport, start: Instant) -> SpectatorSession {
    SessionBuilder::new()
        .start_session_at(transport, start)
        .expect("default configuration is valid")
}

/// Starts a session with the given liveness config and a recording observer.
pub fn start_session_with(
    transport: ScriptedTransport,
    liveness: LivenessConfig,
    start: Instant,
) -> (SpectatorSession, RecordingObserver) {
    let observer = RecordingObserver::new();
    let session = SessionBuilder::new()
        .with_liveness_config(liveness)
        .with_observer(observer.clone())
        .start_session_at(transport, start)
        .expect("liveness configuration is valid");
    (session, observer)
}

/// `start + millis`.
pub fn after(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
}

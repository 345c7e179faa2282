//! Reconnect and shutdown integration tests.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::fixtures::{fresh_room, game_in_progress, position_json};
use crate::common::{after, start_session, start_session_with, ObservedCall, ScriptedTransport};
use ladderwatch::telemetry::{CollectingObserver, ViolationKind};
use ladderwatch::{
    ConnectionStatus, LivenessConfig, LivenessState, SessionBuilder, SpectatorEvent,
    TransportEvent, TurnIndicator,
};
use std::sync::Arc;
use web_time::Instant;

#[test]
fn test_close_keeps_last_mirror_until_reopen() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.close();
    session.poll_at(t0);

    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert!(session.join_prompt_visible());
    assert_eq!(session.mirror().players.len(), 2);
}

#[test]
fn test_reopen_discards_previous_connection_state() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, observer) =
        start_session_with(transport.clone(), LivenessConfig::default(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.close();
    session.poll_at(t0);
    observer.clear();

    transport.open();
    session.poll_at(after(t0, 1_000));
    assert!(session.mirror().is_empty());
    assert_eq!(session.mirror().turn_indicator(), TurnIndicator::AwaitingSync);
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);

    // Patches from the old game wait for a fresh sync.
    transport.data(position_json(1, 50));
    session.poll_at(after(t0, 1_000));
    assert!(session.mirror().is_empty());

    transport.data(fresh_room());
    session.poll_at(after(t0, 1_500));
    assert_eq!(session.mirror().players.len(), 1);
    assert!(observer.calls().contains(&ObservedCall::BoardRequired));
}

#[test]
fn test_duplicate_open_keeps_mirror() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.open();
    session.poll_at(t0);

    assert_eq!(session.mirror().players.len(), 2);
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
}

#[test]
fn test_reopen_restarts_liveness() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    session.poll_at(t0);
    session.poll_at(after(t0, 10_000));
    assert_eq!(session.liveness_state(), LivenessState::Stale);

    transport.close();
    transport.open();
    session.poll_at(after(t0, 11_000));
    assert_eq!(session.liveness_state(), LivenessState::Live);
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    assert_eq!(session.last_signal(), after(t0, 11_000));
    assert_eq!(session.next_liveness_poll(), Some(after(t0, 16_000)));
}

#[test]
fn test_transport_error_disconnects_and_is_reported() {
    let t0 = Instant::now();
    let violations = Arc::new(CollectingObserver::new());
    let transport = ScriptedTransport::new();
    let mut session = SessionBuilder::new()
        .with_violation_observer(violations.clone())
        .start_session_at(transport.clone(), t0)
        .unwrap();

    transport.open();
    transport.data(game_in_progress());
    transport.push(TransportEvent::Error {
        reason: "ice failed".to_owned(),
    });
    session.poll_at(t0);

    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert!(violations.has_violation(ViolationKind::Transport));
    assert_eq!(session.mirror().players.len(), 2);
}

#[test]
fn test_shutdown_ignores_further_traffic() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);
    session.shutdown();
    assert!(session.is_shut_down());
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(session.next_liveness_poll(), None);

    transport.open();
    transport.data(position_json(1, 40));
    session.poll_at(after(t0, 1_000));
    assert_eq!(session.mirror().players[0].pos, 12);
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    // Nothing was read from the transport.
    assert_eq!(transport.pending(), 2);

    let last = session.events().last();
    assert_eq!(
        last,
        Some(SpectatorEvent::StatusChanged {
            status: ConnectionStatus::Disconnected
        })
    );
}

#[test]
fn test_room_id_is_kept_for_the_session() {
    let transport = ScriptedTransport::new();
    let session = SessionBuilder::new()
        .with_room_id(" host-7f3a ")
        .unwrap()
        .start_session(transport)
        .unwrap();
    assert_eq!(session.room_id().unwrap().as_str(), "host-7f3a");
}

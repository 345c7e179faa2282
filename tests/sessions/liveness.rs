//! Liveness integration tests: a host that goes quiet while the channel stays open.
//!
//! All tests use the default liveness configuration (poll every 5s, stale after 7s
//! of silence) and drive the session with explicit timestamps.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::fixtures::{game_in_progress, heartbeat_json, position_json};
use crate::common::{after, start_session, start_session_with, ScriptedTransport};
use ladderwatch::telemetry::{CollectingObserver, ViolationKind};
use ladderwatch::{
    ConnectionStatus, LivenessConfig, LivenessState, LivenessTransition, SessionBuilder,
    SpectatorEvent,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use web_time::Instant;

fn connected(transport: &ScriptedTransport, start: Instant) -> ladderwatch::SpectatorSession {
    let mut session = start_session(transport.clone(), start);
    transport.open();
    transport.data(game_in_progress());
    session.poll_at(start);
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    session
}

#[test]
fn test_silence_past_timeout_disconnects() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = connected(&transport, t0);

    session.poll_at(after(t0, 8_000));

    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert!(session.join_prompt_visible());
    assert_eq!(session.liveness_state(), LivenessState::Stale);
    // Stale is not closed: the mirror is still shown.
    assert_eq!(session.mirror().players.len(), 2);
}

#[test]
fn test_silence_is_noticed_within_one_poll_interval() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = connected(&transport, t0);

    // First poll at 5s: 5s of silence is within the 7s timeout.
    session.poll_at(after(t0, 5_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    // The next poll, at 10s, is the first one past the timeout.
    session.poll_at(after(t0, 9_999));
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    session.poll_at(after(t0, 10_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_traffic_inside_window_prevents_staleness() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = connected(&transport, t0);

    for second in 1..=30_u64 {
        if second % 4 == 0 {
            transport.data(heartbeat_json());
        }
        session.poll_at(after(t0, second * 1_000));
        assert_eq!(
            session.connection_status(),
            ConnectionStatus::Connected,
            "disconnected at {second}s"
        );
    }
    assert_eq!(session.stats().heartbeats, 7);
}

#[test]
fn test_unrecognized_and_presentation_traffic_count_as_liveness() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = connected(&transport, t0);

    transport.data(json!({ "type": "SOMETHING_NEW" }));
    session.poll_at(after(t0, 4_000));
    transport.data(json!({ "type": "FIREWORKS" }));
    session.poll_at(after(t0, 8_000));
    session.poll_at(after(t0, 10_000));

    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
}

#[test]
fn test_decode_failures_do_not_count_as_liveness() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = connected(&transport, t0);

    transport.data(json!({ "no_type": true }));
    session.poll_at(after(t0, 4_000));
    session.poll_at(after(t0, 10_000));

    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(session.stats().decode_failures, 1);
}

#[test]
fn test_host_resumes_on_next_poll() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, observer) =
        start_session_with(transport.clone(), LivenessConfig::default(), t0);
    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);

    session.poll_at(after(t0, 10_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);

    // Traffic alone does not flip the status; the next poll does.
    transport.data(position_json(1, 14));
    session.poll_at(after(t0, 11_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(session.mirror().players[0].pos, 14);

    session.poll_at(after(t0, 15_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);

    assert_eq!(
        observer.statuses(),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connected,
        ]
    );
    let liveness_events: Vec<_> = session
        .events()
        .filter(|event| {
            matches!(
                event,
                SpectatorEvent::HostStale { .. } | SpectatorEvent::HostResumed
            )
        })
        .collect();
    assert_eq!(
        liveness_events,
        vec![
            SpectatorEvent::HostStale {
                silent_for_ms: 10_000
            },
            SpectatorEvent::HostResumed,
        ]
    );
}

#[test]
fn test_closed_channel_is_not_reported_stale() {
    let t0 = Instant::now();
    let violations = Arc::new(CollectingObserver::new());
    let transport = ScriptedTransport::new();
    let mut session = SessionBuilder::new()
        .with_violation_observer(violations.clone())
        .start_session_at(transport.clone(), t0)
        .unwrap();
    transport.open();
    session.poll_at(t0);
    transport.close();
    session.poll_at(after(t0, 1_000));

    assert_eq!(session.poll_liveness(after(t0, 20_000)), None);
    assert_eq!(session.liveness_state(), LivenessState::Live);
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert!(!violations.has_violation(ViolationKind::Liveness));
}

#[test]
fn test_going_stale_is_reported() {
    let t0 = Instant::now();
    let violations = Arc::new(CollectingObserver::new());
    let transport = ScriptedTransport::new();
    let mut session = SessionBuilder::new()
        .with_violation_observer(violations.clone())
        .start_session_at(transport.clone(), t0)
        .unwrap();
    transport.open();
    session.poll_at(t0);

    let transition = session.poll_liveness(after(t0, 8_000));
    assert_eq!(
        transition,
        Some(LivenessTransition::WentStale {
            silent_for: Duration::from_secs(8)
        })
    );
    assert!(violations.has_violation(ViolationKind::Liveness));
}

#[test]
fn test_custom_liveness_config_is_honoured() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, _observer) =
        start_session_with(transport.clone(), LivenessConfig::lan(), t0);
    transport.open();
    session.poll_at(t0);

    session.poll_at(after(t0, 2_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    session.poll_at(after(t0, 3_000));
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(
        session.next_liveness_poll(),
        Some(after(t0, 4_000))
    );
}

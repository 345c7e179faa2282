//! Spectator session integration tests: mirroring the host's game state.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::fixtures::{
    fresh_room, game_in_progress, heartbeat_json, player_json, position_json, sync_json,
    sync_with_viewers_json, viewer_count_json,
};
use crate::common::{start_session, start_session_with, ObservedCall, ScriptedTransport};
use ladderwatch::telemetry::{CollectingObserver, ViolationKind};
use ladderwatch::{
    ConnectionStatus, LivenessConfig, MirrorChange, PlayerId, PresentationEvent,
    SessionBuilder, SpectatorEvent, TransportEvent, TurnIndicator,
};
use serde_json::json;
use std::sync::Arc;
use web_time::Instant;

// ============================================================================
// Full Sync
// ============================================================================

#[test]
fn test_fresh_room_requires_admin_entry() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(fresh_room());
    session.poll_at(t0);

    let mirror = session.mirror();
    assert_eq!(mirror.players.len(), 1);
    assert_eq!(mirror.players[0].pos, 0);
    assert_eq!(mirror.total_rolls(), 0);
    assert_eq!(mirror.turn_indicator(), TurnIndicator::AdminEntryRequired);
    assert_eq!(mirror.turn_indicator().label(), "ADMIN ENTRY REQUIRED");
    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    assert!(!session.join_prompt_visible());
}

#[test]
fn test_position_patch_after_fresh_room() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(fresh_room());
    transport.data(position_json(1, 18));
    session.poll_at(t0);

    let mirror = session.mirror();
    assert_eq!(mirror.players[0].pos, 18);
    assert_eq!(mirror.players[0].rolls, 0);
    assert_eq!(mirror.current_turn_index, 0);
    assert_eq!(session.stats().position_patches, 1);
}

#[test]
fn test_later_full_sync_replaces_everything() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.data(sync_json(&[player_json(3, "Cy", 40, 9)], 0));
    session.poll_at(t0);

    let mirror = session.mirror();
    assert_eq!(mirror.players.len(), 1);
    assert_eq!(mirror.players[0].id, PlayerId::new(3));
    assert_eq!(mirror.current_turn_index, 0);
    assert_eq!(session.stats().full_syncs, 2);
}

#[test]
fn test_update_state_alias_is_a_full_sync() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    let mut record = game_in_progress();
    record["type"] = json!("UPDATE_STATE");
    transport.open();
    transport.data(record);
    session.poll_at(t0);

    assert_eq!(session.mirror().players.len(), 2);
    assert_eq!(
        session.mirror().turn_indicator(),
        TurnIndicator::Active {
            name: "Ben".to_owned(),
            color: "#2ecc71".to_owned(),
        }
    );
}

#[test]
fn test_board_required_precedes_first_mirror_update() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, observer) =
        start_session_with(transport.clone(), LivenessConfig::default(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.data(game_in_progress());
    session.poll_at(t0);

    let calls = observer.calls();
    let board_calls = calls
        .iter()
        .filter(|call| **call == ObservedCall::BoardRequired)
        .count();
    assert_eq!(board_calls, 1);
    let board_at = calls
        .iter()
        .position(|call| *call == ObservedCall::BoardRequired)
        .unwrap();
    let first_update = calls
        .iter()
        .position(|call| matches!(call, ObservedCall::MirrorUpdated { .. }))
        .unwrap();
    assert!(board_at < first_update);

    let events: Vec<_> = session.events().collect();
    assert_eq!(
        events,
        vec![
            SpectatorEvent::StatusChanged {
                status: ConnectionStatus::Connected
            },
            SpectatorEvent::BoardRequired,
            SpectatorEvent::MirrorUpdated {
                change: MirrorChange::Replaced { players: 2 }
            },
            SpectatorEvent::MirrorUpdated {
                change: MirrorChange::Replaced { players: 2 }
            },
        ]
    );
}

#[test]
fn test_marking_board_materialized_suppresses_board_required() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);
    session.mark_board_materialized();

    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);

    assert!(!session
        .events()
        .any(|event| event == SpectatorEvent::BoardRequired));
}

// ============================================================================
// Patches and Viewer Counts
// ============================================================================

#[test]
fn test_patch_for_unknown_player_is_ignored() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);
    let before = session.mirror_checksum().unwrap();

    transport.data(position_json(99, 30));
    session.poll_at(t0);

    assert_eq!(session.mirror_checksum().unwrap(), before);
    assert_eq!(session.stats().stale_patches, 1);
}

#[test]
fn test_patch_before_any_sync_waits() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(position_json(1, 30));
    session.poll_at(t0);

    assert!(session.mirror().is_empty());
    assert_eq!(session.stats().patches_before_sync, 1);
    assert_eq!(session.mirror().turn_indicator(), TurnIndicator::AwaitingSync);
}

#[test]
fn test_viewer_count_survives_patches() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.data(viewer_count_json(42));
    transport.data(position_json(2, 9));
    session.poll_at(t0);

    assert_eq!(session.mirror().viewer_count, Some(42));
    assert_eq!(session.mirror().player(PlayerId::new(2)).unwrap().pos, 9);
}

#[test]
fn test_full_sync_without_count_keeps_last_count() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(sync_with_viewers_json(&[player_json(1, "Ana", 0, 1)], 0, 5));
    transport.data(fresh_room());
    session.poll_at(t0);
    assert_eq!(session.mirror().viewer_count, Some(5));

    transport.data(sync_with_viewers_json(&[player_json(1, "Ana", 0, 1)], 0, 0));
    session.poll_at(t0);
    assert_eq!(session.mirror().viewer_count, Some(0));
}

// ============================================================================
// Presentation Events and Other Kinds
// ============================================================================

#[test]
fn test_presentation_events_are_forwarded_in_order() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, observer) =
        start_session_with(transport.clone(), LivenessConfig::default(), t0);

    transport.open();
    transport.data(json!({ "type": "DICE_ROLL_RESULT", "roll": 6, "playerId": 1 }));
    transport.data(json!({ "type": "ACTION_SOUND", "soundId": "ladder-sound" }));
    transport.data(json!({ "type": "SHOW_MODAL", "title": "Winner", "text": "Ana wins" }));
    transport.data(json!({ "type": "FIREWORKS" }));
    session.poll_at(t0);

    let forwarded: Vec<_> = observer
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ObservedCall::Presentation(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        forwarded,
        vec![
            PresentationEvent::DiceRoll {
                roll: 6,
                player_id: Some(PlayerId::new(1)),
            },
            PresentationEvent::Sound {
                sound_id: "ladder-sound".to_owned(),
            },
            PresentationEvent::ShowModal {
                title: "Winner".to_owned(),
                text: "Ana wins".to_owned(),
            },
            PresentationEvent::FireworksStart,
        ]
    );
    assert!(session.mirror().is_empty());
    assert_eq!(session.stats().presentation_events, 4);
}

#[test]
fn test_heartbeat_and_unknown_kinds_leave_mirror_alone() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);
    let before = session.mirror().clone();

    transport.data(heartbeat_json());
    transport.data(json!({ "type": "CHAT", "text": "hi" }));
    session.poll_at(t0);

    assert_eq!(session.mirror(), &before);
    let stats = session.stats();
    assert_eq!(stats.heartbeats, 1);
    assert_eq!(stats.unrecognized, 1);
    assert_eq!(stats.messages_accepted, 3);
}

#[test]
fn test_malformed_records_are_dropped_and_reported() {
    let t0 = Instant::now();
    let violations = Arc::new(CollectingObserver::new());
    let transport = ScriptedTransport::new();
    let mut session = SessionBuilder::new()
        .with_violation_observer(violations.clone())
        .start_session_at(transport.clone(), t0)
        .unwrap();

    transport.open();
    transport.data(game_in_progress());
    transport.data(json!({ "type": "SYNC_POSITION", "playerId": 1 }));
    transport.data(json!(["not", "a", "record"]));
    transport.push(TransportEvent::RawData(b"{ truncated".to_vec()));
    session.poll_at(t0);

    assert_eq!(session.stats().decode_failures, 3);
    assert_eq!(session.mirror().players[0].pos, 12);
    assert!(violations.has_violation(ViolationKind::Decode));
}

#[test]
fn test_raw_bytes_are_decoded() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.push(TransportEvent::RawData(
        serde_json::to_vec(&game_in_progress()).unwrap(),
    ));
    session.poll_at(t0);

    assert_eq!(session.mirror().players.len(), 2);
}

#[test]
fn test_observer_sees_every_intermediate_mirror() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let (mut session, observer) =
        start_session_with(transport.clone(), LivenessConfig::default(), t0);

    transport.open();
    transport.data(game_in_progress());
    transport.data(position_json(1, 20));
    transport.data(position_json(1, 24));
    session.poll_at(t0);

    let positions: Vec<u32> = observer
        .mirrors()
        .iter()
        .map(|mirror| mirror.player(PlayerId::new(1)).unwrap().pos)
        .collect();
    assert_eq!(positions, vec![12, 20, 24]);
}

#[test]
fn test_leaderboard_follows_turn_order() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(game_in_progress());
    session.poll_at(t0);

    let rows = session.mirror().leaderboard();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Ana");
    assert!(!rows[0].is_current);
    assert_eq!(rows[1].name, "Ben");
    assert!(rows[1].is_current);
}

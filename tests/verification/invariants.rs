//! Mirror invariant tests.
//!
//! The decoder is the only gate in front of the mirror, so every record it accepts
//! must leave the mirror satisfying [`InvariantChecker`], whatever order the records
//! arrive in.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::fixtures::{player_json, position_json, sync_json, viewer_count_json};
use crate::common::{start_session, ScriptedTransport};
use ladderwatch::telemetry::InvariantChecker;
use ladderwatch::{decode, DecodeError, HostMessage, Reconciler};
use proptest::prelude::*;
use serde_json::Value;
use web_time::Instant;

#[test]
fn test_out_of_range_turn_index_never_reaches_mirror() {
    let t0 = Instant::now();
    let transport = ScriptedTransport::new();
    let mut session = start_session(transport.clone(), t0);

    transport.open();
    transport.data(sync_json(&[player_json(1, "Ana", 3, 1)], 0));
    transport.data(sync_json(&[player_json(1, "Ana", 3, 1)], 1));
    session.poll_at(t0);

    assert_eq!(session.stats().decode_failures, 1);
    assert_eq!(session.mirror().current_turn_index, 0);
    session.mirror().check_invariants().unwrap();
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let record = sync_json(
        &[player_json(4, "Ana", 0, 0), player_json(4, "Ben", 0, 0)],
        0,
    );
    let err = decode(&record).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::InvalidField {
            field: "players",
            ..
        }
    ));
}

#[test]
fn test_empty_player_list_accepts_any_index() {
    let message = decode(&sync_json(&[], 3)).unwrap();
    let mut reconciler = Reconciler::new();
    reconciler.apply(message);
    reconciler.mirror().check_invariants().unwrap();
    assert!(reconciler.mirror().is_empty());
}

fn record_strategy() -> impl Strategy<Value = Value> {
    let player = (0u32..6, 0u32..=64, -1i32..10)
        .prop_map(|(id, pos, rolls)| player_json(id, "P", pos, rolls));
    prop_oneof![
        (prop::collection::vec(player, 0..5), 0usize..6)
            .prop_map(|(players, index)| sync_json(&players, index)),
        (0u32..8, 0u32..=64).prop_map(|(id, pos)| position_json(id, pos)),
        (0u32..100).prop_map(viewer_count_json),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_accepted_records_preserve_invariants(
        records in prop::collection::vec(record_strategy(), 1..30)
    ) {
        let mut reconciler = Reconciler::new();
        for record in &records {
            let Ok(message) = decode(record) else {
                continue;
            };
            if let HostMessage::FullSync(sync) = &message {
                prop_assert!(sync.players.is_empty() || sync.current_turn_index < sync.players.len());
            }
            reconciler.apply(message);
            prop_assert!(reconciler.mirror().check_invariants().is_ok());
        }
    }
}

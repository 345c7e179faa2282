//! Property-based tests for reconciliation and liveness.
//!
//! # Properties Tested
//!
//! - Any sequence of full syncs leaves the mirror equal to the last payload
//! - A position patch on a present id changes only that player's position
//! - A position patch on an absent id leaves the mirror byte-for-byte unchanged
//! - Applying the same full sync twice equals applying it once
//! - Silence past the timeout disconnects within one poll interval, and traffic
//!   that never leaves a gap past the timeout never disconnects

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::fixtures::{game_in_progress, heartbeat_json};
use crate::common::{after, start_session, ScriptedTransport};
use ladderwatch::checksum::mirror_checksum;
use ladderwatch::{
    ConnectionStatus, FullSync, HostMessage, Player, PlayerId, PositionPatch, Reconciler,
};
use proptest::prelude::*;
use web_time::Instant;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn player_strategy(id: u32) -> impl Strategy<Value = Player> {
    (0u32..=64, -1i32..30, any::<bool>(), 0u32..5).prop_map(move |(pos, rolls, finished, escapes)| {
        Player {
            id: PlayerId::new(id),
            name: format!("player-{id}"),
            color: format!("#{:06x}", id.wrapping_mul(0x0012_3456) & 0x00ff_ffff),
            pos,
            rolls,
            finished,
            total_rolls_given: rolls.max(0) as u32,
            escapes,
        }
    })
}

/// A well-formed full sync: unique ids and an in-range turn index.
fn full_sync_strategy() -> impl Strategy<Value = FullSync> {
    (
        prop::collection::btree_set(0u32..40, 0..6),
        any::<prop::sample::Index>(),
        prop::option::of(0u32..500),
    )
        .prop_flat_map(|(ids, turn, viewer_count)| {
            let players: Vec<_> = ids.into_iter().map(player_strategy).collect();
            (players, Just(turn), Just(viewer_count))
        })
        .prop_map(|(players, turn, viewer_count)| {
            let current_turn_index = if players.is_empty() {
                0
            } else {
                turn.index(players.len())
            };
            FullSync {
                players,
                current_turn_index,
                viewer_count,
            }
        })
}

fn non_empty_sync_strategy() -> impl Strategy<Value = FullSync> {
    full_sync_strategy().prop_filter("needs at least one player", |sync| {
        !sync.players.is_empty()
    })
}

/// Gaps between host messages, each no longer than the 7s default timeout.
fn chatty_gaps_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..=14, 1..40).prop_map(|gaps| gaps.into_iter().map(|g| g * 500).collect())
}

// ============================================================================
// Reconciliation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_last_full_sync_wins(syncs in prop::collection::vec(full_sync_strategy(), 1..8)) {
        let mut reconciler = Reconciler::new();
        for sync in &syncs {
            reconciler.apply(HostMessage::FullSync(sync.clone()));
        }

        let last = syncs.last().unwrap();
        let mirror = reconciler.mirror();
        prop_assert_eq!(mirror.players.as_slice(), last.players.as_slice());
        prop_assert_eq!(mirror.current_turn_index, last.current_turn_index);
        // A sync without a count keeps the newest count seen before it.
        let expected_count = syncs.iter().rev().find_map(|sync| sync.viewer_count);
        prop_assert_eq!(mirror.viewer_count, expected_count);
    }

    #[test]
    fn prop_patch_moves_only_its_player(
        sync in non_empty_sync_strategy(),
        pick in any::<prop::sample::Index>(),
        new_pos in 0u32..=64,
    ) {
        let mut reconciler = Reconciler::new();
        reconciler.apply(HostMessage::FullSync(sync.clone()));
        let before = reconciler.mirror().clone();
        let target = before.players[pick.index(before.players.len())].id;

        reconciler.apply(HostMessage::PositionPatch(PositionPatch {
            player_id: target,
            new_pos,
        }));

        let after = reconciler.mirror();
        prop_assert_eq!(after.current_turn_index, before.current_turn_index);
        prop_assert_eq!(after.viewer_count, before.viewer_count);
        prop_assert_eq!(after.players.len(), before.players.len());
        for (old, new) in before.players.iter().zip(after.players.iter()) {
            if old.id == target {
                prop_assert_eq!(new.pos, new_pos);
                let mut expected = old.clone();
                expected.pos = new_pos;
                prop_assert_eq!(new, &expected);
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn prop_patch_for_absent_player_changes_nothing(
        sync in full_sync_strategy(),
        absent in 40u32..1_000,
        new_pos in 0u32..=64,
    ) {
        let mut reconciler = Reconciler::new();
        reconciler.apply(HostMessage::FullSync(sync));
        let before = mirror_checksum(reconciler.mirror()).unwrap();

        let outcome = reconciler.apply(HostMessage::PositionPatch(PositionPatch {
            player_id: PlayerId::new(absent),
            new_pos,
        }));

        prop_assert!(!outcome.changed_mirror());
        prop_assert_eq!(mirror_checksum(reconciler.mirror()).unwrap(), before);
    }

    #[test]
    fn prop_full_sync_is_idempotent(sync in full_sync_strategy()) {
        let mut once = Reconciler::new();
        once.apply(HostMessage::FullSync(sync.clone()));

        let mut twice = Reconciler::new();
        twice.apply(HostMessage::FullSync(sync.clone()));
        twice.apply(HostMessage::FullSync(sync));

        prop_assert_eq!(once.mirror(), twice.mirror());
        prop_assert_eq!(
            mirror_checksum(once.mirror()).unwrap(),
            mirror_checksum(twice.mirror()).unwrap()
        );
    }
}

// ============================================================================
// Liveness Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chatty_host_stays_connected(gaps in chatty_gaps_strategy()) {
        let t0 = Instant::now();
        let transport = ScriptedTransport::new();
        let mut session = start_session(transport.clone(), t0);
        transport.open();
        transport.data(game_in_progress());
        session.poll_at(t0);

        let mut next_message = 0u64;
        let mut gaps = gaps.into_iter();
        let end: u64 = 60_000;
        let mut now_ms = 0u64;
        while now_ms <= end {
            if now_ms == next_message {
                transport.data(heartbeat_json());
                next_message += gaps.next().unwrap_or(1_000);
            }
            session.poll_at(after(t0, now_ms));
            prop_assert_eq!(session.connection_status(), ConnectionStatus::Connected);
            now_ms += 500;
        }
    }

    #[test]
    fn prop_silence_disconnects_within_one_interval(talk_for in 0u64..20, step in 1u64..=1_000) {
        let t0 = Instant::now();
        let transport = ScriptedTransport::new();
        let mut session = start_session(transport.clone(), t0);
        transport.open();
        session.poll_at(t0);

        // Heartbeat every second for a while, then go quiet.
        let mut now_ms = 0u64;
        for _ in 0..talk_for {
            now_ms += 1_000;
            transport.data(heartbeat_json());
            session.poll_at(after(t0, now_ms));
        }
        let last_signal = now_ms;

        let mut disconnected_at = None;
        while now_ms <= last_signal + 20_000 {
            now_ms += step;
            session.poll_at(after(t0, now_ms));
            if session.connection_status() == ConnectionStatus::Disconnected {
                disconnected_at = Some(now_ms);
                break;
            }
        }

        let at = disconnected_at.expect("silent host must be noticed");
        // Never before the timeout, and no later than one interval (plus one
        // polling step of slack) after it.
        prop_assert!(at > last_signal + 7_000);
        prop_assert!(at <= last_signal + 7_000 + 5_000 + step);
    }
}

//! Applies decoded host messages to the mirror.
//!
//! Full syncs replace the mirror wholesale; position patches overwrite a single
//! field of a single player; viewer counts overwrite the count. Nothing else
//! about the game is ever computed locally: turn order, roll counts and
//! completion only change when the host sends a full sync.

use tracing::{debug, trace};

use crate::debug_check_invariants;
use crate::mirror::GameMirror;
use crate::network::messages::{FullSync, HostMessage, PositionPatch, PresentationEvent};
use crate::PlayerId;

/// What a reconciled message did to the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MirrorChange {
    /// The whole mirror was replaced.
    Replaced {
        /// Number of players in the new mirror.
        players: usize,
    },
    /// One player's position was overwritten.
    Position {
        /// The player that moved.
        player_id: PlayerId,
        /// Position before the patch.
        previous: u32,
        /// Position after the patch.
        current: u32,
    },
    /// The spectator count was overwritten.
    ViewerCount {
        /// Count before the update, if one was known.
        previous: Option<u32>,
        /// Count after the update.
        current: u32,
    },
}

/// Outcome of applying one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The mirror changed and must be republished before the next message.
    MirrorChanged {
        /// What changed.
        change: MirrorChange,
        /// The presentation layer has no board yet and must build one first.
        board_required: bool,
    },
    /// A position patch named a player the mirror does not contain.
    StaleReference {
        /// The unknown player.
        player_id: PlayerId,
    },
    /// A position patch arrived before any full sync.
    AwaitingFullSync,
    /// A presentation cue to forward untouched.
    Forward(PresentationEvent),
    /// The message only proves the host is alive.
    LivenessOnly,
    /// A kind this client does not understand.
    Dropped {
        /// The wire tag as received.
        kind: String,
    },
}

impl Reconciliation {
    /// Returns `true` if the mirror was modified.
    #[must_use]
    pub const fn changed_mirror(&self) -> bool {
        matches!(self, Self::MirrorChanged { .. })
    }
}

/// Owns the mirror for one connection and applies messages to it in arrival order.
///
/// # Examples
///
/// ```
/// use ladderwatch::{decode, Reconciler, Reconciliation};
/// use serde_json::json;
///
/// let mut reconciler = Reconciler::new();
/// let patch = decode(&json!({ "type": "SYNC_POSITION", "playerId": 1, "newPos": 18 })).unwrap();
/// assert_eq!(reconciler.apply(patch), Reconciliation::AwaitingFullSync);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Reconciler {
    mirror: GameMirror,
    board_materialized: bool,
}

impl Reconciler {
    /// Creates a reconciler with an empty mirror and no board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the current mirror.
    #[must_use]
    pub const fn mirror(&self) -> &GameMirror {
        &self.mirror
    }

    /// Whether a board has been requested since the last reset.
    #[must_use]
    pub const fn board_materialized(&self) -> bool {
        self.board_materialized
    }

    /// Records that the presentation layer already has a board, so the next
    /// full sync will not ask for one.
    pub fn mark_board_materialized(&mut self) {
        self.board_materialized = true;
    }

    /// Discards the mirror and the board flag, as for a brand-new connection.
    pub fn reset(&mut self) {
        self.mirror = GameMirror::default();
        self.board_materialized = false;
    }

    /// Applies one message.
    pub fn apply(&mut self, message: HostMessage) -> Reconciliation {
        match message {
            HostMessage::FullSync(sync) => self.replace(sync),
            HostMessage::PositionPatch(patch) => self.patch_position(patch),
            HostMessage::ViewerCount(update) => {
                let previous = self.mirror.viewer_count.replace(update.count);
                trace!(previous = ?previous, current = update.count, "viewer count updated");
                Reconciliation::MirrorChanged {
                    change: MirrorChange::ViewerCount {
                        previous,
                        current: update.count,
                    },
                    board_required: false,
                }
            },
            HostMessage::Heartbeat => Reconciliation::LivenessOnly,
            HostMessage::Presentation(event) => Reconciliation::Forward(event),
            HostMessage::Unrecognized { kind } => {
                debug!(kind = %kind, "dropping unrecognized host message");
                Reconciliation::Dropped { kind }
            },
        }
    }

    fn replace(&mut self, sync: FullSync) -> Reconciliation {
        let FullSync {
            players,
            current_turn_index,
            viewer_count,
        } = sync;

        self.mirror.players = players.into_iter().collect();
        self.mirror.current_turn_index = current_turn_index;
        // An absent count leaves the last known one in place.
        if viewer_count.is_some() {
            self.mirror.viewer_count = viewer_count;
        }
        debug_check_invariants!(self.mirror, "after full sync");

        let board_required = !self.board_materialized;
        self.board_materialized = true;
        trace!(
            players = self.mirror.players.len(),
            current_turn_index,
            board_required,
            "mirror replaced"
        );
        Reconciliation::MirrorChanged {
            change: MirrorChange::Replaced {
                players: self.mirror.players.len(),
            },
            board_required,
        }
    }

    fn patch_position(&mut self, patch: PositionPatch) -> Reconciliation {
        if self.mirror.is_empty() {
            debug!(player_id = %patch.player_id, "position patch before any full sync");
            return Reconciliation::AwaitingFullSync;
        }
        let Some(player) = self.mirror.player_mut(patch.player_id) else {
            debug!(player_id = %patch.player_id, "position patch for unknown player");
            return Reconciliation::StaleReference {
                player_id: patch.player_id,
            };
        };
        let previous = std::mem::replace(&mut player.pos, patch.new_pos);
        trace!(player_id = %patch.player_id, previous, current = patch.new_pos, "position patched");
        Reconciliation::MirrorChanged {
            change: MirrorChange::Position {
                player_id: patch.player_id,
                previous,
                current: patch.new_pos,
            },
            board_required: false,
        }
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
    use crate::mirror::Player;
    use crate::network::messages::ViewerCount;

    fn player(id: u32, pos: u32, rolls: i32) -> Player {
        Player {
            id: PlayerId::new(id),
            name: format!("P{id}"),
            color: "#abcdef".to_owned(),
            pos,
            rolls,
            finished: false,
            total_rolls_given: 0,
            escapes: 0,
        }
    }

    fn full_sync(players: Vec<Player>, current_turn_index: usize, viewers: Option<u32>) -> HostMessage {
        HostMessage::FullSync(FullSync {
            players,
            current_turn_index,
            viewer_count: viewers,
        })
    }

    fn patch(id: u32, new_pos: u32) -> HostMessage {
        HostMessage::PositionPatch(PositionPatch {
            player_id: PlayerId::new(id),
            new_pos,
        })
    }

    #[test]
    fn first_full_sync_requires_board_once() {
        let mut r = Reconciler::new();
        let first = r.apply(full_sync(vec![player(1, 0, 0)], 0, None));
        assert_eq!(
            first,
            Reconciliation::MirrorChanged {
                change: MirrorChange::Replaced { players: 1 },
                board_required: true
            }
        );
        let second = r.apply(full_sync(vec![player(1, 3, 0)], 0, None));
        assert!(matches!(
            second,
            Reconciliation::MirrorChanged {
                board_required: false,
                ..
            }
        ));
    }

    #[test]
    fn pre_built_board_is_not_requested() {
        let mut r = Reconciler::new();
        r.mark_board_materialized();
        let outcome = r.apply(full_sync(vec![player(1, 0, 0)], 0, None));
        assert!(matches!(
            outcome,
            Reconciliation::MirrorChanged {
                board_required: false,
                ..
            }
        ));
    }

    #[test]
    fn full_sync_replaces_players_and_index() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 5, 1), player(2, 9, 2)], 1, Some(3)));
        r.apply(full_sync(vec![player(3, 1, 0)], 0, None));

        let m = r.mirror();
        assert_eq!(m.players.len(), 1);
        assert_eq!(m.players[0].id, PlayerId::new(3));
        assert_eq!(m.current_turn_index, 0);
        // Absent count keeps the previous one.
        assert_eq!(m.viewer_count, Some(3));
    }

    #[test]
    fn full_sync_with_zero_viewers_overwrites() {
        let mut r = Reconciler::new();
        r.apply(HostMessage::ViewerCount(ViewerCount { count: 8 }));
        r.apply(full_sync(vec![player(1, 0, 0)], 0, Some(0)));
        assert_eq!(r.mirror().viewer_count, Some(0));
    }

    #[test]
    fn patch_overwrites_only_position() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 0, 4), player(2, 7, 1)], 1, None));
        let outcome = r.apply(patch(1, 18));
        assert_eq!(
            outcome,
            Reconciliation::MirrorChanged {
                change: MirrorChange::Position {
                    player_id: PlayerId::new(1),
                    previous: 0,
                    current: 18
                },
                board_required: false
            }
        );
        let m = r.mirror();
        assert_eq!(m.players[0].pos, 18);
        assert_eq!(m.players[0].rolls, 4);
        assert_eq!(m.players[1], player(2, 7, 1));
        assert_eq!(m.current_turn_index, 1);
    }

    #[test]
    fn patch_for_unknown_player_is_stale() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 0, 0)], 0, None));
        let before = r.mirror().clone();
        assert_eq!(
            r.apply(patch(99, 10)),
            Reconciliation::StaleReference {
                player_id: PlayerId::new(99)
            }
        );
        assert_eq!(r.mirror(), &before);
    }

    #[test]
    fn patch_before_sync_waits() {
        let mut r = Reconciler::new();
        assert_eq!(r.apply(patch(1, 10)), Reconciliation::AwaitingFullSync);
        assert!(r.mirror().is_empty());
        assert!(!r.board_materialized());
    }

    #[test]
    fn viewer_count_survives_patches() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 0, 0)], 0, None));
        let outcome = r.apply(HostMessage::ViewerCount(ViewerCount { count: 42 }));
        assert_eq!(
            outcome,
            Reconciliation::MirrorChanged {
                change: MirrorChange::ViewerCount {
                    previous: None,
                    current: 42
                },
                board_required: false
            }
        );
        r.apply(patch(1, 2));
        assert_eq!(r.mirror().viewer_count, Some(42));
    }

    #[test]
    fn non_state_messages_leave_mirror_alone() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 0, 0)], 0, None));
        let before = r.mirror().clone();

        assert_eq!(r.apply(HostMessage::Heartbeat), Reconciliation::LivenessOnly);
        assert_eq!(
            r.apply(HostMessage::Presentation(PresentationEvent::FireworksStart)),
            Reconciliation::Forward(PresentationEvent::FireworksStart)
        );
        let dropped = r.apply(HostMessage::Unrecognized {
            kind: "CHAT".to_owned(),
        });
        assert!(!dropped.changed_mirror());
        assert_eq!(r.mirror(), &before);
    }

    #[test]
    fn reset_discards_mirror_and_board() {
        let mut r = Reconciler::new();
        r.apply(full_sync(vec![player(1, 0, 0)], 0, Some(2)));
        r.reset();
        assert_eq!(r.mirror(), &GameMirror::default());
        assert!(!r.board_materialized());
    }
}

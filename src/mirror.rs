//! The spectator's local copy of the host's game state.
//!
//! A [`GameMirror`] is owned by exactly one session and mutated only by the
//! [`Reconciler`](crate::Reconciler). Everything here is read-side: the derived
//! views (turn indicator, leaderboard) are computed from the mirror on demand and
//! never stored.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::PlayerId;

/// One player as the host last described them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable identity assigned by the host.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color, as a CSS color string.
    pub color: String,
    /// Current tile. `0` means the player has not entered the board yet.
    pub pos: u32,
    /// Rolls the player has left to use. The host may report zero or negative values.
    pub rolls: i32,
    /// Whether the player reached the final tile.
    #[serde(default)]
    pub finished: bool,
    /// Rolls granted to the player over the whole game.
    #[serde(default)]
    pub total_rolls_given: u32,
    /// Times the player slid down a snake.
    #[serde(default)]
    pub escapes: u32,
}

/// Player list in turn order. Most games have at most four players.
pub type PlayerList = SmallVec<[Player; 4]>;

/// Local copy of the authoritative game state.
///
/// Whenever `players` is non-empty, `current_turn_index < players.len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMirror {
    /// Every player, in turn order.
    pub players: PlayerList,
    /// Index into `players` of the player whose turn it is.
    pub current_turn_index: usize,
    /// Spectator count, once the host has reported one.
    pub viewer_count: Option<u32>,
}

impl GameMirror {
    /// Returns `true` until the first full sync has populated the player list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Looks up a player by id.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// The player whose turn it is, if the mirror has been synced.
    #[must_use]
    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn_index)
    }

    /// Sum of unused rolls over every player.
    ///
    /// A total of zero means the host operator has not handed out any rolls yet.
    #[must_use]
    pub fn total_rolls(&self) -> i64 {
        self.players.iter().map(|p| i64::from(p.rolls)).sum()
    }

    /// What the turn banner should say.
    ///
    /// # Examples
    ///
    /// ```
    /// use ladderwatch::{GameMirror, TurnIndicator};
    ///
    /// let mirror = GameMirror::default();
    /// assert_eq!(mirror.turn_indicator(), TurnIndicator::AwaitingSync);
    /// ```
    #[must_use]
    pub fn turn_indicator(&self) -> TurnIndicator {
        let Some(active) = self.active_player() else {
            return TurnIndicator::AwaitingSync;
        };
        if self.total_rolls() == 0 {
            TurnIndicator::AdminEntryRequired
        } else if active.rolls <= 0 {
            TurnIndicator::Waiting {
                name: active.name.clone(),
            }
        } else {
            TurnIndicator::Active {
                name: active.name.clone(),
                color: active.color.clone(),
            }
        }
    }

    /// One row per player, in turn order, for the standings table.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let current = self.active_player().map(|p| p.id);
        self.players
            .iter()
            .map(|p| LeaderboardRow {
                id: p.id,
                name: p.name.clone(),
                color: p.color.clone(),
                pos: p.pos,
                rolls: p.rolls,
                is_current: Some(p.id) == current,
                finished: p.finished,
            })
            .collect()
    }
}

impl InvariantChecker for GameMirror {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if !self.players.is_empty() && self.current_turn_index >= self.players.len() {
            return Err(InvariantViolation::new(
                "GameMirror",
                "current_turn_index must index into players",
            )
            .with_details(format!(
                "current_turn_index={}, players={}",
                self.current_turn_index,
                self.players.len()
            )));
        }
        for (i, player) in self.players.iter().enumerate() {
            if self.players.iter().skip(i + 1).any(|other| other.id == player.id) {
                return Err(InvariantViolation::new(
                    "GameMirror",
                    "player ids must be unique",
                )
                .with_details(format!("duplicate id={}", player.id)));
            }
        }
        Ok(())
    }
}

/// Turn banner state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnIndicator {
    /// No state has arrived yet.
    AwaitingSync,
    /// Nobody has any rolls; the host operator must hand some out.
    AdminEntryRequired,
    /// The active player has no rolls left.
    Waiting {
        /// Active player's name.
        name: String,
    },
    /// The active player can roll.
    Active {
        /// Active player's name.
        name: String,
        /// Active player's color.
        color: String,
    },
}

impl TurnIndicator {
    /// Banner text.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::AwaitingSync => String::new(),
            Self::AdminEntryRequired => "ADMIN ENTRY REQUIRED".to_owned(),
            Self::Waiting { name } => format!("{name} (Waiting...)"),
            Self::Active { name, .. } => name.clone(),
        }
    }
}

/// A row of the standings table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardRow {
    /// Player identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Current tile.
    pub pos: u32,
    /// Unused rolls.
    pub rolls: i32,
    /// Whether it is this player's turn.
    pub is_current: bool,
    /// Whether this player finished.
    pub finished: bool,
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
    use smallvec::smallvec;

    fn player(id: u32, name: &str, rolls: i32) -> Player {
        Player {
            id: PlayerId::new(id),
            name: name.to_owned(),
            color: format!("#{id:06x}"),
            pos: 0,
            rolls,
            finished: false,
            total_rolls_given: 0,
            escapes: 0,
        }
    }

    fn mirror(players: PlayerList, current_turn_index: usize) -> GameMirror {
        GameMirror {
            players,
            current_turn_index,
            viewer_count: None,
        }
    }

    #[test]
    fn empty_mirror_awaits_sync() {
        let m = GameMirror::default();
        assert!(m.is_empty());
        assert!(m.active_player().is_none());
        assert_eq!(m.turn_indicator(), TurnIndicator::AwaitingSync);
        assert!(m.leaderboard().is_empty());
    }

    #[test]
    fn zero_total_rolls_requires_admin_entry() {
        let m = mirror(smallvec![player(1, "Ana", 0), player(2, "Ben", 0)], 1);
        assert_eq!(m.turn_indicator(), TurnIndicator::AdminEntryRequired);
        assert_eq!(m.turn_indicator().label(), "ADMIN ENTRY REQUIRED");
    }

    #[test]
    fn negative_rolls_can_cancel_to_zero_total() {
        let m = mirror(smallvec![player(1, "Ana", 2), player(2, "Ben", -2)], 0);
        assert_eq!(m.total_rolls(), 0);
        assert_eq!(m.turn_indicator(), TurnIndicator::AdminEntryRequired);
    }

    #[test]
    fn active_player_without_rolls_is_waiting() {
        let m = mirror(smallvec![player(1, "Ana", 0), player(2, "Ben", 3)], 0);
        assert_eq!(m.turn_indicator().label(), "Ana (Waiting...)");
    }

    #[test]
    fn active_player_with_rolls_is_named() {
        let m = mirror(smallvec![player(1, "Ana", 0), player(2, "Ben", 3)], 1);
        assert_eq!(
            m.turn_indicator(),
            TurnIndicator::Active {
                name: "Ben".to_owned(),
                color: "#000002".to_owned()
            }
        );
        assert_eq!(m.turn_indicator().label(), "Ben");
    }

    #[test]
    fn leaderboard_marks_current_and_keeps_order() {
        let mut finished = player(3, "Cy", 1);
        finished.finished = true;
        finished.pos = 64;
        let m = mirror(smallvec![player(1, "Ana", 0), player(2, "Ben", 3), finished], 1);

        let rows = m.leaderboard();
        let ids: Vec<u32> = rows.iter().map(|r| r.id.as_u32()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!rows[0].is_current);
        assert!(rows[1].is_current);
        assert!(rows[2].finished);
        assert_eq!(rows[2].pos, 64);
    }

    #[test]
    fn player_lookup_by_id() {
        let m = mirror(smallvec![player(7, "Ana", 0), player(9, "Ben", 0)], 0);
        assert_eq!(m.player(PlayerId::new(9)).map(|p| p.name.as_str()), Some("Ben"));
        assert!(m.player(PlayerId::new(8)).is_none());
    }

    #[test]
    fn invariants_hold_for_valid_mirror() {
        let m = mirror(smallvec![player(1, "Ana", 0)], 0);
        assert!(m.check_invariants().is_ok());
        assert!(GameMirror::default().check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_bad_index_and_duplicates() {
        let m = mirror(smallvec![player(1, "Ana", 0)], 1);
        let err = m.check_invariants().unwrap_err();
        assert!(err.to_string().contains("current_turn_index"));

        let m = mirror(smallvec![player(1, "Ana", 0), player(1, "Ana again", 0)], 0);
        let err = m.check_invariants().unwrap_err();
        assert!(err.to_string().contains("unique"));
    }
}

use serde::{Deserialize, Serialize};

use crate::mirror::Player;
use crate::PlayerId;

/// Wire tags the host uses for a full state replacement.
///
/// `SYNC` is sent once right after a spectator connects, `UPDATE_STATE` after
/// every turn. Both carry the same payload.
pub(crate) const FULL_SYNC_TAGS: &[&str] = &["SYNC", "UPDATE_STATE", "FULL_SYNC"];
pub(crate) const POSITION_PATCH_TAGS: &[&str] = &["SYNC_POSITION", "POSITION_PATCH"];
pub(crate) const VIEWER_COUNT_TAG: &str = "VIEWER_COUNT";
pub(crate) const HEARTBEAT_TAG: &str = "HEARTBEAT";
pub(crate) const PRESENTATION_TAGS: &[&str] = &[
    "ACTION_SOUND",
    "DICE_ROLL_RESULT",
    "SHOW_MODAL",
    "HIDE_MODAL",
    "FIREWORKS",
    "STOP_FIREWORKS",
];

/// Returns `true` if `tag` names a message kind this client understands.
pub(crate) fn is_known_tag(tag: &str) -> bool {
    FULL_SYNC_TAGS.contains(&tag)
        || POSITION_PATCH_TAGS.contains(&tag)
        || tag == VIEWER_COUNT_TAG
        || tag == HEARTBEAT_TAG
        || PRESENTATION_TAGS.contains(&tag)
}

/// Payload of a full state replacement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSync {
    /// Every player, in turn order.
    pub players: Vec<Player>,
    /// Index into `players` of the player whose turn it is.
    pub current_turn_index: usize,
    /// Spectator count, when the host includes it.
    #[serde(default)]
    pub viewer_count: Option<u32>,
}

/// Payload of a single-player position update.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPatch {
    /// The player to move.
    pub player_id: PlayerId,
    /// The tile the player now stands on.
    pub new_pos: u32,
}

/// Payload of a spectator count update.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCount {
    /// Number of spectators currently connected to the host.
    pub count: u32,
}

/// Host-driven cues that only matter to the presentation layer.
///
/// These are forwarded verbatim and never folded into the mirror.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresentationEvent {
    /// Play the named sound from the start.
    #[serde(rename = "ACTION_SOUND", rename_all = "camelCase")]
    Sound {
        /// Identifier of the sound asset.
        sound_id: String,
    },
    /// Show the value of the dice the host just rolled.
    #[serde(rename = "DICE_ROLL_RESULT", rename_all = "camelCase")]
    DiceRoll {
        /// The rolled value.
        roll: u32,
        /// Who rolled, when the host says so.
        #[serde(default)]
        player_id: Option<PlayerId>,
    },
    /// Show an announcement. Spectators get no dismiss button; the host closes it.
    #[serde(rename = "SHOW_MODAL")]
    ShowModal {
        /// Heading of the announcement.
        title: String,
        /// Body text of the announcement.
        text: String,
    },
    /// Close the announcement.
    #[serde(rename = "HIDE_MODAL")]
    HideModal,
    /// Start the celebration effect.
    #[serde(rename = "FIREWORKS")]
    FireworksStart,
    /// Stop the celebration effect and its sound.
    #[serde(rename = "STOP_FIREWORKS")]
    FireworksStop,
}

/// A decoded host message: one variant per kind in the closed tag set.
///
/// Decoding happens once, in [`decode`](crate::network::decoder::decode);
/// everything downstream matches on this enum exhaustively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostMessage {
    /// Replaces the entire mirror.
    FullSync(FullSync),
    /// Overwrites one player's position.
    PositionPatch(PositionPatch),
    /// Overwrites the spectator count.
    ViewerCount(ViewerCount),
    /// Liveness signal only.
    Heartbeat,
    /// Forwarded to the presentation layer.
    Presentation(PresentationEvent),
    /// A well-formed record whose kind this client does not know.
    ///
    /// Newer hosts may send kinds this client predates; they are dropped but
    /// still count as evidence the host is alive.
    Unrecognized {
        /// The wire tag as received.
        kind: String,
    },
}

impl HostMessage {
    /// A short label for logs.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            HostMessage::FullSync(_) => "FULL_SYNC",
            HostMessage::PositionPatch(_) => "POSITION_PATCH",
            HostMessage::ViewerCount(_) => "VIEWER_COUNT",
            HostMessage::Heartbeat => "HEARTBEAT",
            HostMessage::Presentation(_) => "PRESENTATION_EVENT",
            HostMessage::Unrecognized { kind } => kind,
        }
    }

    /// Returns `true` for the kinds that change displayable mirror state.
    #[must_use]
    pub const fn touches_mirror(&self) -> bool {
        matches!(
            self,
            HostMessage::FullSync(_) | HostMessage::PositionPatch(_) | HostMessage::ViewerCount(_)
        )
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
    use serde_json::json;

    #[test]
    fn test_known_tags_cover_aliases() {
        assert!(is_known_tag("SYNC"));
        assert!(is_known_tag("UPDATE_STATE"));
        assert!(is_known_tag("SYNC_POSITION"));
        assert!(is_known_tag("STOP_FIREWORKS"));
        assert!(!is_known_tag("sync"));
        assert!(!is_known_tag("CHAT"));
    }

    #[test]
    fn test_full_sync_reads_camel_case_fields() {
        let sync: FullSync = serde_json::from_value(json!({
            "players": [],
            "currentTurnIndex": 0,
            "viewerCount": 5
        }))
        .unwrap();
        assert_eq!(sync.viewer_count, Some(5));
        assert_eq!(sync.current_turn_index, 0);
    }

    #[test]
    fn test_full_sync_viewer_count_is_optional() {
        let sync: FullSync =
            serde_json::from_value(json!({ "players": [], "currentTurnIndex": 0 })).unwrap();
        assert_eq!(sync.viewer_count, None);

        let sync: FullSync = serde_json::from_value(
            json!({ "players": [], "currentTurnIndex": 0, "viewerCount": null }),
        )
        .unwrap();
        assert_eq!(sync.viewer_count, None);
    }

    #[test]
    fn test_presentation_event_tags() {
        let event: PresentationEvent =
            serde_json::from_value(json!({ "type": "ACTION_SOUND", "soundId": "snake-sound" }))
                .unwrap();
        assert_eq!(
            event,
            PresentationEvent::Sound {
                sound_id: "snake-sound".to_owned()
            }
        );

        let event: PresentationEvent =
            serde_json::from_value(json!({ "type": "DICE_ROLL_RESULT", "roll": 4 })).unwrap();
        assert_eq!(
            event,
            PresentationEvent::DiceRoll {
                roll: 4,
                player_id: None
            }
        );

        let event: PresentationEvent =
            serde_json::from_value(json!({ "type": "STOP_FIREWORKS" })).unwrap();
        assert_eq!(event, PresentationEvent::FireworksStop);
    }

    #[test]
    fn test_touches_mirror() {
        assert!(HostMessage::ViewerCount(ViewerCount { count: 1 }).touches_mirror());
        assert!(!HostMessage::Heartbeat.touches_mirror());
        assert!(!HostMessage::Presentation(PresentationEvent::HideModal).touches_mirror());
        assert!(!HostMessage::Unrecognized {
            kind: "CHAT".to_owned()
        }
        .touches_mirror());
    }
}

//! Classification of inbound host records.
//!
//! The host speaks a closed set of `type` tags. [`decode`] turns one record into
//! exactly one [`HostMessage`] or rejects it with a [`DecodeError`]; nothing past
//! this module ever looks at a raw record again.
//!
//! Rejection rules:
//!
//! - A record that is not an object, or has no string `type`, is rejected.
//! - A known tag whose payload is missing or has ill-typed required fields is
//!   rejected as [`DecodeError::Malformed`].
//! - A full sync whose turn index points outside its player list, or that lists
//!   the same player id twice, is rejected as [`DecodeError::InvalidField`].
//! - An unknown tag on an otherwise well-formed record is *accepted* as
//!   [`HostMessage::Unrecognized`].

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::network::messages::{
    is_known_tag, FullSync, HostMessage, PositionPatch, PresentationEvent, ViewerCount,
    FULL_SYNC_TAGS, HEARTBEAT_TAG, POSITION_PATCH_TAGS, VIEWER_COUNT_TAG,
};

/// Name of the discriminating field on every host record.
const KIND_FIELD: &str = "type";

/// Why an inbound record was rejected.
///
/// A rejected record never reaches the mirror and does not count as host traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The raw bytes were not valid JSON.
    InvalidJson {
        /// Parser diagnostic.
        reason: String,
    },
    /// The record is valid JSON but not an object.
    NotAnObject,
    /// The record has no `type` field, or it is not a string.
    MissingKind,
    /// A known kind with a payload that does not match its shape.
    Malformed {
        /// The wire tag as received.
        kind: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// A known kind whose payload parsed but breaks a structural rule.
    InvalidField {
        /// The wire tag as received.
        kind: String,
        /// The offending field, in wire spelling.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl DecodeError {
    /// The wire tag of the rejected record, when it had a readable one.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Malformed { kind, .. } | Self::InvalidField { kind, .. } => Some(kind),
            Self::InvalidJson { .. } | Self::NotAnObject | Self::MissingKind => None,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson { reason } => write!(f, "record is not valid JSON: {reason}"),
            Self::NotAnObject => write!(f, "record is not a JSON object"),
            Self::MissingKind => write!(f, "record has no string `type` field"),
            Self::Malformed { kind, reason } => write!(f, "malformed {kind} record: {reason}"),
            Self::InvalidField {
                kind,
                field,
                reason,
            } => write!(f, "invalid `{field}` in {kind} record: {reason}"),
        }
    }
}

impl Error for DecodeError {}

/// Classifies one structured host record.
///
/// # Examples
///
/// ```
/// use ladderwatch::{decode, HostMessage};
/// use serde_json::json;
///
/// let msg = decode(&json!({ "type": "SYNC_POSITION", "playerId": 1, "newPos": 18 })).unwrap();
/// assert!(matches!(msg, HostMessage::PositionPatch(p) if p.new_pos == 18));
///
/// let msg = decode(&json!({ "type": "CHAT", "text": "hi" })).unwrap();
/// assert_eq!(msg, HostMessage::Unrecognized { kind: "CHAT".to_owned() });
///
/// assert!(decode(&json!({ "type": "SYNC_POSITION", "playerId": 1 })).is_err());
/// ```
pub fn decode(record: &Value) -> Result<HostMessage, DecodeError> {
    let object = record.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = object
        .get(KIND_FIELD)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingKind)?;

    if !is_known_tag(kind) {
        return Ok(HostMessage::Unrecognized {
            kind: kind.to_owned(),
        });
    }

    if FULL_SYNC_TAGS.contains(&kind) {
        let sync: FullSync = payload(kind, record)?;
        validate_full_sync(kind, &sync)?;
        Ok(HostMessage::FullSync(sync))
    } else if POSITION_PATCH_TAGS.contains(&kind) {
        payload::<PositionPatch>(kind, record).map(HostMessage::PositionPatch)
    } else if kind == VIEWER_COUNT_TAG {
        payload::<ViewerCount>(kind, record).map(HostMessage::ViewerCount)
    } else if kind == HEARTBEAT_TAG {
        Ok(HostMessage::Heartbeat)
    } else {
        payload::<PresentationEvent>(kind, record).map(HostMessage::Presentation)
    }
}

/// Parses raw JSON bytes and classifies the resulting record.
///
/// Bytes that are not JSON at all are rejected with [`DecodeError::InvalidJson`].
pub fn decode_bytes(bytes: &[u8]) -> Result<HostMessage, DecodeError> {
    let record: Value = serde_json::from_slice(bytes).map_err(|err| DecodeError::InvalidJson {
        reason: err.to_string(),
    })?;
    decode(&record)
}

fn payload<T: DeserializeOwned>(kind: &str, record: &Value) -> Result<T, DecodeError> {
    T::deserialize(record).map_err(|err| DecodeError::Malformed {
        kind: kind.to_owned(),
        reason: err.to_string(),
    })
}

fn validate_full_sync(kind: &str, sync: &FullSync) -> Result<(), DecodeError> {
    let player_count = sync.players.len();
    if player_count > 0 && sync.current_turn_index >= player_count {
        return Err(DecodeError::InvalidField {
            kind: kind.to_owned(),
            field: "currentTurnIndex",
            reason: format!(
                "index {} is out of range for {} players",
                sync.current_turn_index, player_count
            ),
        });
    }

    let mut seen = BTreeSet::new();
    for player in &sync.players {
        if !seen.insert(player.id) {
            return Err(DecodeError::InvalidField {
                kind: kind.to_owned(),
                field: "players",
                reason: format!("player id {} appears more than once", player.id),
            });
        }
    }
    Ok(())
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
    use crate::PlayerId;
    use serde_json::json;

    fn player(id: u32, rolls: i32) -> Value {
        json!({ "id": id, "name": format!("P{id}"), "color": "#123456", "pos": 0, "rolls": rolls })
    }

    #[test]
    fn test_full_sync_aliases_decode_identically() {
        let mut decoded = Vec::new();
        for tag in ["SYNC", "UPDATE_STATE", "FULL_SYNC"] {
            let record = json!({ "type": tag, "players": [player(1, 0)], "currentTurnIndex": 0 });
            decoded.push(decode(&record).unwrap());
        }
        assert!(matches!(&decoded[0], HostMessage::FullSync(sync) if sync.players.len() == 1));
        assert_eq!(decoded[0], decoded[1]);
        assert_eq!(decoded[1], decoded[2]);
    }

    #[test]
    fn test_optional_player_fields_default() {
        let msg = decode(&json!({
            "type": "SYNC",
            "players": [player(4, 2)],
            "currentTurnIndex": 0
        }))
        .unwrap();
        let HostMessage::FullSync(sync) = msg else {
            panic!("expected full sync");
        };
        let p = &sync.players[0];
        assert_eq!(p.id, PlayerId::new(4));
        assert!(!p.finished);
        assert_eq!(p.total_rolls_given, 0);
        assert_eq!(p.escapes, 0);
    }

    #[test]
    fn test_position_patch_aliases() {
        for tag in ["SYNC_POSITION", "POSITION_PATCH"] {
            let msg = decode(&json!({ "type": tag, "playerId": 2, "newPos": 30 })).unwrap();
            assert_eq!(
                msg,
                HostMessage::PositionPatch(PositionPatch {
                    player_id: PlayerId::new(2),
                    new_pos: 30
                })
            );
        }
    }

    #[test]
    fn test_heartbeat_ignores_extra_fields() {
        let msg = decode(&json!({ "type": "HEARTBEAT", "sentAt": 1234 })).unwrap();
        assert_eq!(msg, HostMessage::Heartbeat);
    }

    #[test]
    fn test_presentation_events_pass_through() {
        let msg = decode(&json!({ "type": "SHOW_MODAL", "title": "Winner", "text": "Ana wins" }))
            .unwrap();
        assert_eq!(
            msg,
            HostMessage::Presentation(PresentationEvent::ShowModal {
                title: "Winner".to_owned(),
                text: "Ana wins".to_owned()
            })
        );
    }

    #[test]
    fn test_unknown_kind_is_accepted_as_unrecognized() {
        let msg = decode(&json!({ "type": "KICK_PLAYER", "playerId": 1 })).unwrap();
        assert_eq!(
            msg,
            HostMessage::Unrecognized {
                kind: "KICK_PLAYER".to_owned()
            }
        );
    }

    #[test]
    fn test_record_shape_errors() {
        assert_eq!(decode(&json!([1, 2])), Err(DecodeError::NotAnObject));
        assert_eq!(decode(&json!("SYNC")), Err(DecodeError::NotAnObject));
        assert_eq!(decode(&json!({ "kind": "SYNC" })), Err(DecodeError::MissingKind));
        assert_eq!(decode(&json!({ "type": 7 })), Err(DecodeError::MissingKind));
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = decode(&json!({ "type": "SYNC_POSITION", "playerId": 1 })).unwrap_err();
        assert!(matches!(&err, DecodeError::Malformed { kind, .. } if kind == "SYNC_POSITION"));
        assert_eq!(err.kind(), Some("SYNC_POSITION"));

        let err = decode(&json!({ "type": "VIEWER_COUNT", "count": "many" })).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));

        let err = decode(&json!({ "type": "SYNC", "currentTurnIndex": 0 })).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_player_missing_rolls_is_malformed() {
        let err = decode(&json!({
            "type": "SYNC",
            "players": [{ "id": 1, "name": "Ana", "color": "#f00", "pos": 0 }],
            "currentTurnIndex": 0
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_turn_index_out_of_range_is_rejected() {
        let err = decode(&json!({
            "type": "UPDATE_STATE",
            "players": [player(1, 0), player(2, 0)],
            "currentTurnIndex": 2
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidField {
                field: "currentTurnIndex",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_player_list_accepts_any_turn_index() {
        let msg = decode(&json!({ "type": "SYNC", "players": [], "currentTurnIndex": 3 }));
        assert!(msg.is_ok());
    }

    #[test]
    fn test_duplicate_player_ids_are_rejected() {
        let err = decode(&json!({
            "type": "SYNC",
            "players": [player(1, 0), player(1, 3)],
            "currentTurnIndex": 0
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "players", .. }));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_decode_bytes() {
        let msg = decode_bytes(br#"{"type":"VIEWER_COUNT","count":42}"#).unwrap();
        assert_eq!(msg, HostMessage::ViewerCount(ViewerCount { count: 42 }));

        let err = decode_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson { .. }));
        assert_eq!(err.kind(), None);
    }
}

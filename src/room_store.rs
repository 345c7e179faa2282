//! Persistence of the last room the spectator joined.
//!
//! The stored id only pre-fills the next connection attempt; it never triggers a
//! connection by itself and losing it is harmless.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LadderError;

/// Longest room id accepted, in characters.
pub const ROOM_ID_MAX_LEN: usize = 128;

/// Version of the on-disk record layout.
const RECORD_VERSION: u32 = 1;

/// Identifier of the host's room, as typed by the spectator.
///
/// Surrounding whitespace is trimmed; the remainder must be non-empty and free of
/// whitespace and control characters.
///
/// ```
/// use ladderwatch::RoomId;
///
/// let id: RoomId = "  host-7f3a  ".parse().unwrap();
/// assert_eq!(id.as_str(), "host-7f3a");
/// assert!(RoomId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validates and normalizes a room id.
    pub fn parse(value: &str) -> Result<Self, RoomIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RoomIdError::Empty);
        }
        let found = trimmed.chars().count();
        if found > ROOM_ID_MAX_LEN {
            return Err(RoomIdError::TooLong {
                max: ROOM_ID_MAX_LEN,
                found,
            });
        }
        for (index, ch) in trimmed.chars().enumerate() {
            if ch.is_whitespace() || ch.is_control() {
                return Err(RoomIdError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The normalized id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Why a room id was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomIdError {
    /// Nothing left after trimming.
    Empty,
    /// Longer than [`ROOM_ID_MAX_LEN`].
    TooLong {
        /// Maximum accepted length.
        max: usize,
        /// Length of the rejected id.
        found: usize,
    },
    /// Contains whitespace or a control character.
    InvalidCharacter {
        /// The rejected character.
        ch: char,
        /// Its position in the trimmed id.
        index: usize,
    },
}

impl fmt::Display for RoomIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomIdError::Empty => write!(f, "room id must not be empty"),
            RoomIdError::TooLong { max, found } => {
                write!(f, "room id must be at most {max} chars, got {found}")
            },
            RoomIdError::InvalidCharacter { ch, index } => {
                write!(f, "invalid character {ch:?} at position {index}")
            },
        }
    }
}

impl std::error::Error for RoomIdError {}

impl From<RoomIdError> for LadderError {
    fn from(err: RoomIdError) -> Self {
        LadderError::InvalidRoomId {
            reason: err.to_string(),
        }
    }
}

/// Just the version field, read before committing to a record layout.
#[derive(Debug, Deserialize)]
struct RecordHeader {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomRecord {
    version: u32,
    room_id: RoomId,
}

/// Stores the last joined room id as a small JSON file.
///
/// ```no_run
/// use ladderwatch::{LastRoomStore, RoomId};
///
/// let store = LastRoomStore::new("ladderwatch-room.json");
/// store.save(&RoomId::parse("host-7f3a")?)?;
/// let prefill = store.load()?;
/// # Ok::<(), ladderwatch::LadderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRoomStore {
    path: PathBuf,
}

impl LastRoomStore {
    /// A store backed by the file at `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored id.
    ///
    /// A missing file, or one written by a different record version, yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<RoomId>, LadderError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(persistence("read", &self.path, &err)),
        };
        let header: RecordHeader =
            serde_json::from_str(&contents).map_err(|err| persistence("parse", &self.path, &err))?;
        if header.version != RECORD_VERSION {
            debug!(
                path = %self.path.display(),
                version = header.version,
                "ignoring room record with unknown version"
            );
            return Ok(None);
        }
        let record: RoomRecord =
            serde_json::from_str(&contents).map_err(|err| persistence("parse", &self.path, &err))?;
        Ok(Some(record.room_id))
    }

    /// Overwrites the stored id.
    pub fn save(&self, room_id: &RoomId) -> Result<(), LadderError> {
        let record = RoomRecord {
            version: RECORD_VERSION,
            room_id: room_id.clone(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|err| persistence("encode", &self.path, &err))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| persistence("create", parent, &err))?;
        }
        // Write then rename so a crash never leaves a half-written record.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|err| persistence("write", &staging, &err))?;
        fs::rename(&staging, &self.path).map_err(|err| persistence("replace", &self.path, &err))?;
        debug!(path = %self.path.display(), room_id = %room_id, "saved last room");
        Ok(())
    }

    /// Removes the stored id. Clearing an empty store succeeds.
    pub fn clear(&self) -> Result<(), LadderError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(persistence("remove", &self.path, &err)),
        }
    }
}

fn persistence(action: &str, path: &Path, err: &dyn std::error::Error) -> LadderError {
    LadderError::Persistence {
        context: format!("failed to {action} {}: {err}", path.display()),
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

    #[test]
    fn parse_trims_and_accepts() {
        assert_eq!(RoomId::parse(" abc ").unwrap().as_str(), "abc");
        assert_eq!("peer-1234".parse::<RoomId>().unwrap().to_string(), "peer-1234");
    }

    #[test]
    fn parse_rejects_bad_ids() {
        assert_eq!(RoomId::parse(""), Err(RoomIdError::Empty));
        assert_eq!(RoomId::parse(" \t\n"), Err(RoomIdError::Empty));
        assert_eq!(
            RoomId::parse("a b"),
            Err(RoomIdError::InvalidCharacter { ch: ' ', index: 1 })
        );
        let long = "x".repeat(ROOM_ID_MAX_LEN + 1);
        assert!(matches!(
            RoomId::parse(&long),
            Err(RoomIdError::TooLong { found, .. }) if found == ROOM_ID_MAX_LEN + 1
        ));
    }

    #[test]
    fn room_id_error_converts_to_ladder_error() {
        let err: LadderError = RoomIdError::Empty.into();
        assert!(matches!(err, LadderError::InvalidRoomId { .. }));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn serde_rejects_invalid_ids() {
        let parsed: Result<RoomId, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());
        let parsed: RoomId = serde_json::from_str("\"room\"").unwrap();
        assert_eq!(parsed.as_str(), "room");
    }
}

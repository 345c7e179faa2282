//! Binary encoding used for deterministic mirror fingerprints.
//!
//! Host records arrive as JSON, but comparing two mirrors for byte-for-byte
//! equality needs a canonical binary form. This module owns the single bincode
//! configuration used for that, so every fingerprint in the crate is computed
//! from identical bytes.

use serde::Serialize;
use std::fmt;

// Fixed-size integers keep the encoding independent of the values, so two mirrors
// that differ only in one field differ only in that field's bytes.
fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Represents what operation was being performed when a codec error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding a mirror snapshot.
    EncodeSnapshot,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeSnapshot => write!(f, "encoding mirror snapshot"),
        }
    }
}

/// Errors that can occur during encoding.
///
/// Bincode errors are opaque, so the underlying message is kept as a `String`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    EncodeError {
        /// The underlying bincode error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
}

impl CodecError {
    /// Creates a new encode error with the given message and operation.
    pub fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    /// The operation that failed.
    #[must_use]
    pub const fn operation(&self) -> CodecOperation {
        match self {
            Self::EncodeError { operation, .. } => *operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a value, tagging any failure with `operation`.
pub(crate) fn encode_as<T: Serialize>(value: &T, operation: CodecOperation) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config())
        .map_err(|e| CodecError::encode(e.to_string(), operation))
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
    use crate::mirror::{GameMirror, Player};
    use crate::PlayerId;

    fn mirror_at(pos: u32) -> GameMirror {
        let mut mirror = GameMirror::default();
        mirror.players.push(Player {
            id: PlayerId::new(1),
            name: "Ana".to_owned(),
            color: "#ff0000".to_owned(),
            pos,
            rolls: 2,
            finished: false,
            total_rolls_given: 3,
            escapes: 0,
        });
        mirror
    }

    #[test]
    fn test_fixed_int_encoding_is_value_independent() {
        let small = encode_as(&1u32, CodecOperation::EncodeSnapshot).unwrap();
        let large = encode_as(&u32::MAX, CodecOperation::EncodeSnapshot).unwrap();
        assert_eq!(small.len(), 4);
        assert_eq!(small.len(), large.len());
    }

    #[test]
    fn test_position_change_keeps_encoded_length() {
        let start = encode_as(&mirror_at(0), CodecOperation::EncodeSnapshot).unwrap();
        let moved = encode_as(&mirror_at(64), CodecOperation::EncodeSnapshot).unwrap();
        assert_eq!(start.len(), moved.len());
        assert_ne!(start, moved);
    }

    #[test]
    fn test_encode_error_reports_operation() {
        let err = CodecError::encode("boom", CodecOperation::EncodeSnapshot);
        assert_eq!(err.operation(), CodecOperation::EncodeSnapshot);
        assert_eq!(
            err.to_string(),
            "encoding failed while encoding mirror snapshot: boom"
        );
    }
}

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::network::decoder::DecodeError;

/// This enum contains all error messages this library can return. Most API functions will generally return a [`Result<(), LadderError>`].
///
/// Nothing in this crate treats an error as fatal to the process: the worst outcome of any
/// failure is a frozen or disconnected display, recoverable by starting a fresh session.
///
/// [`Result<(), LadderError>`]: std::result::Result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// A configuration value is out of its accepted range.
    InvalidConfig {
        /// The offending configuration field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A room identifier could not be accepted.
    InvalidRoomId {
        /// Why the identifier was rejected.
        reason: String,
    },
    /// An inbound host message could not be decoded.
    Decode(DecodeError),
    /// Serialization or deserialization of data failed.
    SerializationError {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
    /// Reading or writing the persisted room record failed.
    Persistence {
        /// A description of the storage failure.
        context: String,
    },
}

impl Display for LadderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LadderError::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration for `{}`: {}", field, reason)
            },
            LadderError::InvalidRoomId { reason } => {
                write!(f, "Invalid room id: {}", reason)
            },
            LadderError::Decode(err) => {
                write!(f, "Failed to decode host message: {}", err)
            },
            LadderError::SerializationError { context } => {
                write!(f, "Serialization error: {}", context)
            },
            LadderError::Persistence { context } => {
                write!(f, "Persistence error: {}", context)
            },
        }
    }
}

impl Error for LadderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LadderError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for LadderError {
    fn from(err: DecodeError) -> Self {
        LadderError::Decode(err)
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
    fn display_names_the_config_field() {
        let err = LadderError::InvalidConfig {
            field: "poll_interval",
            reason: "must be at least 10ms".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("poll_interval"));
        assert!(msg.contains("10ms"));
    }

    #[test]
    fn decode_errors_convert_and_keep_their_source() {
        let err: LadderError = DecodeError::MissingKind.into();
        assert!(matches!(err, LadderError::Decode(DecodeError::MissingKind)));
        assert!(err.source().is_some());
        let persistence = LadderError::Persistence {
            context: "disk full".to_owned(),
        };
        assert!(persistence.source().is_none());
    }
}

//! Deterministic fingerprints of mirror state.
//!
//! A fingerprint is the FNV-1a hash of the bincode encoding (fixed-size integers)
//! of a value. Two mirrors with the same fingerprint encode to the same bytes, which
//! is how tests and diagnostics prove that a dropped message left the mirror
//! untouched.
//!
//! ```
//! use ladderwatch::checksum::mirror_checksum;
//! use ladderwatch::GameMirror;
//!
//! let mirror = GameMirror::default();
//! let before = mirror_checksum(&mirror).expect("mirror should encode");
//! assert_eq!(before, mirror_checksum(&mirror).unwrap());
//! ```

use crate::mirror::GameMirror;
use crate::network::codec::{encode_as, CodecError, CodecOperation};

/// FNV-1a 64-bit offset basis constant.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime constant.
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Computes the fingerprint of a mirror snapshot.
pub fn mirror_checksum(mirror: &GameMirror) -> Result<u128, ChecksumError> {
    let bytes = encode_as(mirror, CodecOperation::EncodeSnapshot)?;
    Ok(hash_bytes_fnv1a(&bytes))
}

/// Computes a deterministic FNV-1a hash of raw bytes and returns it as `u128`.
#[inline]
#[must_use]
pub fn hash_bytes_fnv1a(bytes: &[u8]) -> u128 {
    let hash = bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    u128::from(hash)
}

/// Errors that can occur during checksum computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// Serialization of the value failed.
    SerializationFailed(String),
}

impl From<CodecError> for ChecksumError {
    fn from(err: CodecError) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<ChecksumError> for crate::LadderError {
    fn from(err: ChecksumError) -> Self {
        Self::SerializationError {
            context: err.to_string(),
        }
    }
}

impl std::fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationFailed(msg) => write!(f, "checksum failed: {msg}"),
        }
    }
}

impl std::error::Error for ChecksumError {}

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
    use crate::PlayerId;

    fn sample_mirror() -> GameMirror {
        let mut mirror = GameMirror::default();
        mirror.players.push(Player {
            id: PlayerId::new(1),
            name: "Ana".to_owned(),
            color: "#e11d48".to_owned(),
            pos: 0,
            rolls: 0,
            finished: false,
            total_rolls_given: 0,
            escapes: 0,
        });
        mirror
    }

    #[test]
    fn fnv1a_known_values() {
        // Reference values for 64-bit FNV-1a.
        assert_eq!(hash_bytes_fnv1a(b""), u128::from(0xcbf2_9ce4_8422_2325_u64));
        assert_eq!(hash_bytes_fnv1a(b"a"), u128::from(0xaf63_dc4c_8601_ec8c_u64));
    }

    #[test]
    fn mirror_checksum_is_deterministic() {
        let mirror = sample_mirror();
        assert_eq!(
            mirror_checksum(&mirror).unwrap(),
            mirror_checksum(&mirror.clone()).unwrap()
        );
    }

    #[test]
    fn mirror_checksum_sees_single_field_changes() {
        let before = sample_mirror();
        let mut after = before.clone();
        after.players[0].pos = 18;
        assert_ne!(
            mirror_checksum(&before).unwrap(),
            mirror_checksum(&after).unwrap()
        );

        let mut counted = before.clone();
        counted.viewer_count = Some(0);
        assert_ne!(
            mirror_checksum(&before).unwrap(),
            mirror_checksum(&counted).unwrap()
        );
    }

    #[test]
    fn checksum_error_display() {
        let err = ChecksumError::SerializationFailed("nope".to_owned());
        assert_eq!(err.to_string(), "checksum failed: nope");
    }

    #[test]
    fn codec_failure_surfaces_as_serialization_error() {
        let err: ChecksumError = CodecError::encode("boom", CodecOperation::EncodeSnapshot).into();
        let err: crate::LadderError = err.into();
        assert!(matches!(
            err,
            crate::LadderError::SerializationError { ref context }
                if context.contains("encoding mirror snapshot") && context.contains("boom")
        ));
    }
}

//! Configuration types for spectator sessions.
//!
//! | Config Type | Purpose | Key Presets |
//! |-------------|---------|-------------|
//! | `LivenessConfig` | Host silence detection | `lan()`, `mobile()`, `relaxed()` |
//! | `SpectatorConfig` | Board geometry and event buffering | `new()` |
//!
//! # Example
//!
//! ```
//! use ladderwatch::{LivenessConfig, SessionBuilder};
//!
//! let builder = SessionBuilder::new().with_liveness_config(LivenessConfig::mobile());
//! ```

use web_time::Duration;

use crate::board::BoardLayout;
use crate::LadderError;

/// Default cap on queued, undrained session events.
pub const DEFAULT_MAX_EVENT_QUEUE_SIZE: usize = 256;

/// Configuration for host liveness detection.
///
/// The monitor samples the time since the host last said anything every
/// `poll_interval`, and marks the host stale once that silence exceeds `timeout`.
/// The host is expected to send a heartbeat well inside the timeout.
///
/// # Example
///
/// ```
/// use ladderwatch::LivenessConfig;
/// use web_time::Duration;
///
/// let config = LivenessConfig {
///     timeout: Duration::from_secs(10),
///     ..LivenessConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "LivenessConfig has no effect unless passed to SessionBuilder::with_liveness_config()"]
pub struct LivenessConfig {
    /// How often the monitor checks the clock.
    ///
    /// Default: 5 seconds
    pub poll_interval: Duration,

    /// Silence longer than this marks the host stale.
    ///
    /// Default: 7 seconds
    pub timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(7),
        }
    }
}

impl LivenessConfig {
    /// Creates a new `LivenessConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration preset for a host on the same network.
    ///
    /// Detects a vanished host within about three seconds.
    pub fn lan() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }

    /// Configuration preset for spectators on cellular networks.
    ///
    /// Tolerates the multi-second stalls common on mobile links.
    pub fn mobile() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
        }
    }

    /// Configuration preset for hosts that only heartbeat occasionally.
    pub fn relaxed() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }

    /// Validates the liveness configuration.
    ///
    /// # Errors
    ///
    /// Returns `LadderError::InvalidConfig` if any duration is out of range.
    pub fn validate(&self) -> Result<(), LadderError> {
        // Validate poll_interval: 10ms to 60000ms
        check_duration("poll_interval", self.poll_interval, 10, 60_000)?;
        // Validate timeout: 100ms to 600000ms (10 minutes)
        check_duration("timeout", self.timeout, 100, 600_000)?;
        Ok(())
    }
}

fn check_duration(
    field: &'static str,
    value: Duration,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), LadderError> {
    if value < Duration::from_millis(min_ms) || value > Duration::from_millis(max_ms) {
        return Err(LadderError::InvalidConfig {
            field,
            reason: format!(
                "must be between {}ms and {}ms, got {}ms",
                min_ms,
                max_ms,
                value.as_millis()
            ),
        });
    }
    Ok(())
}

/// Configuration for spectator sessions.
///
/// # Example
///
/// ```
/// use ladderwatch::{BoardLayout, SpectatorConfig};
///
/// let config = SpectatorConfig {
///     max_event_queue_size: 64,
///     ..SpectatorConfig::default()
/// };
/// assert_eq!(config.board, BoardLayout::standard());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpectatorConfig has no effect unless passed to SessionBuilder::with_spectator_config()"]
pub struct SpectatorConfig {
    /// Geometry of the board the host is playing on.
    ///
    /// Default: [`BoardLayout::standard`]
    pub board: BoardLayout,

    /// Maximum number of undrained events the session keeps.
    ///
    /// When full, the oldest event is discarded to make room.
    ///
    /// Default: 256
    pub max_event_queue_size: usize,
}

impl Default for SpectatorConfig {
    fn default() -> Self {
        Self {
            board: BoardLayout::standard(),
            max_event_queue_size: DEFAULT_MAX_EVENT_QUEUE_SIZE,
        }
    }
}

impl SpectatorConfig {
    /// Creates a new `SpectatorConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the spectator configuration.
    ///
    /// # Errors
    ///
    /// Returns `LadderError::InvalidConfig` if the board is malformed or the
    /// event queue cannot hold a single event.
    pub fn validate(&self) -> Result<(), LadderError> {
        self.board.validate()?;
        if self.max_event_queue_size == 0 {
            return Err(LadderError::InvalidConfig {
                field: "max_event_queue_size",
                reason: "must hold at least one event".to_owned(),
            });
        }
        Ok(())
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
    fn test_liveness_defaults() {
        let config = LivenessConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config, LivenessConfig::new());
    }

    #[test]
    fn test_liveness_presets_are_valid() {
        for config in [
            LivenessConfig::default(),
            LivenessConfig::lan(),
            LivenessConfig::mobile(),
            LivenessConfig::relaxed(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn test_liveness_poll_interval_bounds() {
        let too_fast = LivenessConfig {
            poll_interval: Duration::from_millis(9),
            ..LivenessConfig::default()
        };
        let err = too_fast.validate().unwrap_err();
        assert!(matches!(
            err,
            LadderError::InvalidConfig {
                field: "poll_interval",
                ..
            }
        ));

        let too_slow = LivenessConfig {
            poll_interval: Duration::from_secs(61),
            ..LivenessConfig::default()
        };
        assert!(too_slow.validate().is_err());

        let edge = LivenessConfig {
            poll_interval: Duration::from_millis(10),
            ..LivenessConfig::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_liveness_timeout_bounds() {
        let too_short = LivenessConfig {
            timeout: Duration::from_millis(99),
            ..LivenessConfig::default()
        };
        let err = too_short.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));

        let too_long = LivenessConfig {
            timeout: Duration::from_secs(601),
            ..LivenessConfig::default()
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_spectator_config_defaults() {
        let config = SpectatorConfig::new();
        assert_eq!(config.max_event_queue_size, DEFAULT_MAX_EVENT_QUEUE_SIZE);
        assert_eq!(config.board.tile_count(), 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spectator_config_rejects_empty_queue() {
        let config = SpectatorConfig {
            max_event_queue_size: 0,
            ..SpectatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LadderError::InvalidConfig {
                field: "max_event_queue_size",
                ..
            })
        ));
    }
}

//! # Ladderwatch
//!
//! Ladderwatch is the read-only spectator core for a hosted snakes-and-ladders game.
//! One authoritative host owns the game and broadcasts its state over a peer-to-peer
//! data channel; a ladderwatch session mirrors that state for display and never issues
//! a game action of its own.
//!
//! The crate covers three things:
//!
//! - **Decoding**: every inbound record is classified once into a closed [`HostMessage`]
//!   enum (or rejected with a [`DecodeError`]).
//! - **Reconciliation**: decoded messages are applied to a [`GameMirror`] in arrival order,
//!   full-replace for state syncs and single-field patches for position updates.
//! - **Liveness**: a [`LivenessMonitor`] samples the time since the host last said
//!   anything and marks the host stale after a timeout, even while the channel itself
//!   still claims to be open.
//!
//! The transport is not part of this crate. Implement [`Transport`] on top of whatever
//! peer-to-peer library carries the host's data channel, or feed events through
//! [`tokio_driver::ChannelTransport`].
//!
//! ```
//! use ladderwatch::{ConnectionStatus, SessionBuilder, Transport, TransportEvent};
//! use serde_json::json;
//!
//! struct Replay(Vec<TransportEvent>);
//!
//! impl Transport for Replay {
//!     fn poll_events(&mut self) -> Vec<TransportEvent> {
//!         std::mem::take(&mut self.0)
//!     }
//! }
//!
//! let transport = Replay(vec![
//!     TransportEvent::Open,
//!     TransportEvent::Data(json!({
//!         "type": "SYNC",
//!         "players": [{ "id": 1, "name": "Ana", "color": "#f00", "pos": 0, "rolls": 0 }],
//!         "currentTurnIndex": 0
//!     })),
//! ]);
//!
//! let mut session = SessionBuilder::new().start_session(transport)?;
//! session.poll_remote();
//!
//! assert_eq!(session.connection_status(), ConnectionStatus::Connected);
//! assert_eq!(session.mirror().turn_indicator().label(), "ADMIN ENTRY REQUIRED");
//! # Ok::<(), ladderwatch::LadderError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use board::{BoardLayout, Portal, PortalKind};
pub use error::LadderError;
pub use liveness::{LivenessClock, LivenessMonitor, LivenessState, LivenessTransition, PollSchedule};
pub use mirror::{GameMirror, LeaderboardRow, Player, PlayerList, TurnIndicator};
pub use network::decoder::{decode, decode_bytes, DecodeError};
pub use network::messages::{FullSync, HostMessage, PositionPatch, PresentationEvent, ViewerCount};
pub use network::session_stats::SessionStats;
pub use reconciler::{MirrorChange, Reconciler, Reconciliation};
pub use room_store::{LastRoomStore, RoomId, RoomIdError};
pub use sessions::builder::SessionBuilder;
pub use sessions::config::{LivenessConfig, SpectatorConfig};
pub use sessions::event_drain::EventDrain;
pub use sessions::observer::SpectatorObserver;
pub use sessions::spectator_session::SpectatorSession;

pub mod board;
pub mod checksum;
#[doc(hidden)]
pub mod error;
pub mod liveness;
pub mod mirror;
pub mod reconciler;
pub mod room_store;
pub mod telemetry;
#[cfg(feature = "tokio")]
pub mod tokio_driver;
#[doc(hidden)]
pub mod sessions {
    #[doc(hidden)]
    pub mod builder;
    #[doc(hidden)]
    pub mod config;
    #[doc(hidden)]
    pub mod event_drain;
    #[doc(hidden)]
    pub mod observer;
    #[doc(hidden)]
    pub mod spectator_session;
}
pub mod network {
    /// Binary codec used for deterministic mirror fingerprints.
    pub mod codec;
    /// Classification of inbound host records.
    pub mod decoder;
    /// Wire payloads and the decoded message enum.
    pub mod messages;
    #[doc(hidden)]
    pub mod session_stats;
}

// #############
// #   TYPES   #
// #############

/// Stable numeric identity of a player, as assigned by the host.
///
/// Identities never change for the lifetime of a game and are unique within
/// the player list.
///
/// # Examples
///
/// ```
/// use ladderwatch::PlayerId;
///
/// let id = PlayerId::new(3);
/// assert_eq!(id.as_u32(), 3);
/// assert_eq!(id.to_string(), "3");
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a new `PlayerId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        PlayerId(id)
    }

    /// Returns the underlying value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PlayerId {
    #[inline]
    fn from(value: u32) -> Self {
        PlayerId(value)
    }
}

// #############
// #   ENUMS   #
// #############

/// Whether the spectator currently has a live host to watch.
///
/// This is derived, never stored by the host: it is `Connected` only while the
/// transport channel is open **and** the liveness monitor considers the host live.
/// The join prompt is visible exactly when the status is not `Connected`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No usable host: not yet connected, channel closed, or host gone silent.
    #[default]
    Disconnected,
    /// The channel is open and the host is producing traffic.
    Connected,
}

impl ConnectionStatus {
    /// Returns `true` if the status is [`ConnectionStatus::Connected`].
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Whether the presentation layer should show the join prompt.
    #[must_use]
    pub const fn join_prompt_visible(self) -> bool {
        !self.is_connected()
    }
}

/// Lifecycle and data events delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The data channel to the host opened.
    Open,
    /// A structured record arrived from the host.
    Data(serde_json::Value),
    /// A raw JSON-encoded record arrived from the host.
    RawData(Vec<u8>),
    /// The data channel closed.
    Close,
    /// The data channel failed.
    Error {
        /// Description from the transport.
        reason: String,
    },
}

/// Notifications that you can receive from the session, in the order they happened.
///
/// # Forward Compatibility
///
/// This enum is marked `#[non_exhaustive]` because new event types may be
/// added in future versions. Always include a wildcard arm when matching.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpectatorEvent {
    /// The derived connection status changed.
    StatusChanged {
        /// The new status.
        status: ConnectionStatus,
    },
    /// The first state sync since connecting arrived; build the board before rendering it.
    BoardRequired,
    /// The mirror changed; render it.
    MirrorUpdated {
        /// What changed.
        change: MirrorChange,
    },
    /// A presentation cue from the host.
    Presentation(PresentationEvent),
    /// The host has produced no traffic for longer than the liveness timeout.
    HostStale {
        /// How long the host had been silent when the poll noticed.
        silent_for_ms: u128,
    },
    /// Traffic from a stale host resumed.
    HostResumed,
}

// #############
// #  TRAITS   #
// #############

/// The data channel to one host, as seen by the spectator.
///
/// Connection establishment, NAT traversal and reconnect backoff are the
/// implementor's business. The session only asks for whatever happened since the
/// last call, and processes it strictly in the returned order.
#[cfg(feature = "sync-send")]
pub trait Transport: Send + Sync {
    /// Returns every lifecycle and data event received since the last call, in delivery order.
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

/// The data channel to one host, as seen by the spectator.
///
/// Connection establishment, NAT traversal and reconnect backoff are the
/// implementor's business. The session only asks for whatever happened since the
/// last call, and processes it strictly in the returned order.
#[cfg(not(feature = "sync-send"))]
pub trait Transport {
    /// Returns every lifecycle and data event received since the last call, in delivery order.
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

// ###################
// # UNIT TESTS      #
// ###################

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
    fn player_id_reads_plain_json_numbers() {
        let id: PlayerId = serde_json::from_str("7").unwrap();
        assert_eq!(id, PlayerId::new(7));
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn connection_status_defaults_to_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn join_prompt_is_negation_of_connected() {
        for status in [ConnectionStatus::Connected, ConnectionStatus::Disconnected] {
            assert_eq!(status.join_prompt_visible(), !status.is_connected());
        }
    }
}

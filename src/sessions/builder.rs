use std::sync::Arc;

use web_time::Instant;

use crate::report_violation_to;
use crate::room_store::RoomId;
use crate::sessions::config::{LivenessConfig, SpectatorConfig};
use crate::sessions::observer::SpectatorObserver;
use crate::sessions::spectator_session::SpectatorSession;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{LadderError, Transport};

/// The [`SessionBuilder`] builds a [`SpectatorSession`]. Call the `with_*` methods you
/// need, then [`start_session`](Self::start_session) with the transport to the host.
///
/// # Example
///
/// ```
/// use ladderwatch::{LivenessConfig, SessionBuilder, Transport, TransportEvent};
///
/// struct Idle;
/// impl Transport for Idle {
///     fn poll_events(&mut self) -> Vec<TransportEvent> {
///         Vec::new()
///     }
/// }
///
/// let session = SessionBuilder::new()
///     .with_liveness_config(LivenessConfig::lan())
///     .with_room_id("host-7f3a")?
///     .start_session(Idle)?;
/// assert_eq!(session.room_id().map(|id| id.as_str()), Some("host-7f3a"));
/// # Ok::<(), ladderwatch::LadderError>(())
/// ```
pub struct SessionBuilder {
    liveness_config: LivenessConfig,
    spectator_config: SpectatorConfig,
    room_id: Option<RoomId>,
    observer: Option<Box<dyn SpectatorObserver>>,
    /// Optional observer for protocol violations.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            liveness_config,
            spectator_config,
            room_id,
            observer,
            violation_observer,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("liveness_config", liveness_config)
            .field("spectator_config", spectator_config)
            .field("room_id", room_id)
            .field("has_observer", &observer.is_some())
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Construct a new builder with all values set to their defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            liveness_config: LivenessConfig::default(),
            spectator_config: SpectatorConfig::default(),
            room_id: None,
            observer: None,
            violation_observer: None,
        }
    }

    /// Sets the liveness poll interval and timeout. Validated when the session starts.
    #[must_use]
    pub fn with_liveness_config(mut self, liveness_config: LivenessConfig) -> Self {
        self.liveness_config = liveness_config;
        self
    }

    /// Sets the board geometry and event queue size. Validated when the session starts.
    #[must_use]
    pub fn with_spectator_config(mut self, spectator_config: SpectatorConfig) -> Self {
        self.spectator_config = spectator_config;
        self
    }

    /// Records which room the session is for.
    ///
    /// # Errors
    /// - Returns [`InvalidRoomId`] if the id is blank or contains whitespace.
    ///
    /// [`InvalidRoomId`]: LadderError::InvalidRoomId
    pub fn with_room_id(mut self, room_id: &str) -> Result<Self, LadderError> {
        self.room_id = Some(RoomId::parse(room_id)?);
        Ok(self)
    }

    /// Sets the presentation-layer observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl SpectatorObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Sets a custom observer for protocol violations.
    ///
    /// If no observer is set, violations are logged via the `tracing` crate by default.
    ///
    /// ```
    /// use ladderwatch::{SessionBuilder, telemetry::CollectingObserver};
    /// use std::sync::Arc;
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let builder = SessionBuilder::new().with_violation_observer(observer.clone());
    /// assert!(observer.is_empty());
    /// ```
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Consumes the builder to construct a [`SpectatorSession`] on `transport`.
    ///
    /// # Errors
    /// - Returns [`InvalidConfig`] if the liveness or spectator configuration is out of range.
    ///
    /// [`InvalidConfig`]: LadderError::InvalidConfig
    pub fn start_session(
        self,
        transport: impl Transport + 'static,
    ) -> Result<SpectatorSession, LadderError> {
        self.start_session_at(transport, Instant::now())
    }

    /// Like [`start_session`](Self::start_session), with `now` as the session's start time.
    pub fn start_session_at(
        self,
        transport: impl Transport + 'static,
        now: Instant,
    ) -> Result<SpectatorSession, LadderError> {
        self.liveness_config.validate()?;
        self.spectator_config.validate()?;

        let LivenessConfig {
            poll_interval,
            timeout,
        } = self.liveness_config;
        if timeout < poll_interval {
            report_violation_to!(
                &self.violation_observer,
                ViolationSeverity::Warning,
                ViolationKind::Configuration,
                "liveness timeout {}ms is shorter than the poll interval {}ms; staleness is only noticed at each poll",
                timeout.as_millis(),
                poll_interval.as_millis()
            );
        }

        let SpectatorConfig {
            board,
            max_event_queue_size,
        } = self.spectator_config;
        Ok(SpectatorSession::new(
            Box::new(transport),
            self.liveness_config,
            board,
            max_event_queue_size,
            self.room_id,
            self.observer,
            self.violation_observer,
            now,
        ))
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
    use crate::telemetry::CollectingObserver;
    use crate::TransportEvent;
    use web_time::Duration;

    struct Idle;

    impl Transport for Idle {
        fn poll_events(&mut self) -> Vec<TransportEvent> {
            Vec::new()
        }
    }

    #[test]
    fn test_builder_defaults_start() {
        let session = SessionBuilder::new().start_session(Idle).unwrap();
        assert_eq!(session.liveness_config(), LivenessConfig::default());
        assert!(session.room_id().is_none());
        assert!(session.violation_observer().is_none());
    }

    #[test]
    fn test_invalid_liveness_config_is_rejected() {
        let result = SessionBuilder::new()
            .with_liveness_config(LivenessConfig {
                poll_interval: Duration::ZERO,
                ..LivenessConfig::default()
            })
            .start_session(Idle);
        assert!(matches!(
            result,
            Err(LadderError::InvalidConfig {
                field: "poll_interval",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_spectator_config_is_rejected() {
        let result = SessionBuilder::new()
            .with_spectator_config(SpectatorConfig {
                max_event_queue_size: 0,
                ..SpectatorConfig::default()
            })
            .start_session(Idle);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_room_id_is_rejected() {
        let err = SessionBuilder::new().with_room_id("   ").unwrap_err();
        assert!(matches!(err, LadderError::InvalidRoomId { .. }));
    }

    #[test]
    fn test_short_timeout_warns() {
        let observer = Arc::new(CollectingObserver::new());
        let session = SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .with_liveness_config(LivenessConfig {
                poll_interval: Duration::from_secs(5),
                timeout: Duration::from_secs(1),
            })
            .start_session(Idle);
        assert!(session.is_ok());
        assert!(observer.has_violation(ViolationKind::Configuration));
    }

    #[test]
    fn test_debug_hides_observers() {
        let builder = SessionBuilder::new()
            .with_violation_observer(Arc::new(CollectingObserver::new()));
        let debug = format!("{builder:?}");
        assert!(debug.contains("has_violation_observer: true"));
        assert!(debug.contains("has_observer: false"));
    }
}

use crate::mirror::GameMirror;
use crate::network::messages::PresentationEvent;
use crate::reconciler::MirrorChange;
use crate::ConnectionStatus;

/// Push-style hooks for the presentation layer.
///
/// Every callback runs synchronously inside the session call that caused it,
/// before the next inbound message is processed, so a renderer driven from here
/// sees every intermediate mirror. All methods default to doing nothing.
///
/// The same notifications are also queued as [`SpectatorEvent`](crate::SpectatorEvent)s
/// for pull-style consumers.
///
/// # Thread Safety
///
/// When the `sync-send` feature is enabled, observers must be `Send + Sync`.
#[cfg(feature = "sync-send")]
pub trait SpectatorObserver: Send + Sync {
    /// The first full sync since connecting arrived; build the board now.
    fn on_board_required(&mut self) {}

    /// The mirror changed.
    fn on_mirror_updated(&mut self, _mirror: &GameMirror, _change: &MirrorChange) {}

    /// The host sent a presentation cue.
    fn on_presentation_event(&mut self, _event: &PresentationEvent) {}

    /// The derived connection status changed.
    fn on_connection_status(&mut self, _status: ConnectionStatus) {}
}

/// Push-style hooks for the presentation layer.
///
/// Every callback runs synchronously inside the session call that caused it,
/// before the next inbound message is processed, so a renderer driven from here
/// sees every intermediate mirror. All methods default to doing nothing.
///
/// The same notifications are also queued as [`SpectatorEvent`](crate::SpectatorEvent)s
/// for pull-style consumers.
#[cfg(not(feature = "sync-send"))]
pub trait SpectatorObserver {
    /// The first full sync since connecting arrived; build the board now.
    fn on_board_required(&mut self) {}

    /// The mirror changed.
    fn on_mirror_updated(&mut self, _mirror: &GameMirror, _change: &MirrorChange) {}

    /// The host sent a presentation cue.
    fn on_presentation_event(&mut self, _event: &PresentationEvent) {}

    /// The derived connection status changed.
    fn on_connection_status(&mut self, _status: ConnectionStatus) {}
}

//! Tokio adapter for driving a [`SpectatorSession`].
//!
//! The session itself is synchronous: it only does work when polled. This module
//! provides the two pieces needed to run it inside a Tokio application:
//!
//! - [`ChannelTransport`], a [`Transport`] fed through an unbounded channel. Whatever
//!   task owns the real peer-to-peer connection pushes events into the paired
//!   [`TransportFeed`].
//! - [`drive`], a future that polls the session whenever the feed delivers something
//!   and whenever the session's next liveness poll falls due, until it is cancelled
//!   through the returned [`DriverHandle`].
//!
//! # Example
//!
//! ```
//! use ladderwatch::tokio_driver::{channel_transport, drive};
//! use ladderwatch::SessionBuilder;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ladderwatch::LadderError> {
//! let (feed, transport) = channel_transport();
//! let session = SessionBuilder::new().start_session(transport)?;
//! let (handle, driver) = drive(session, &feed);
//!
//! let connection = async move {
//!     feed.open();
//!     feed.data(json!({ "type": "SYNC", "players": [], "currentTurnIndex": 0 }));
//!     tokio::time::sleep(std::time::Duration::from_millis(5)).await;
//!     handle.cancel();
//! };
//!
//! let (session, ()) = tokio::join!(driver, connection);
//! assert!(session.is_shut_down());
//! assert_eq!(session.stats().full_syncs, 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flag
//!
//! This module requires the `tokio` feature flag, which is on by default.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Notify};
use tokio::time::{sleep_until, Instant as TokioInstant};
use tracing::{debug, trace};

use crate::{SpectatorSession, Transport, TransportEvent};

/// Creates a connected [`TransportFeed`] / [`ChannelTransport`] pair.
#[must_use]
pub fn channel_transport() -> (TransportFeed, ChannelTransport) {
    let (tx, rx) = unbounded_channel();
    (
        TransportFeed {
            tx,
            wakeup: Arc::new(Notify::new()),
        },
        ChannelTransport { rx },
    )
}

/// Sending half of a [`ChannelTransport`].
///
/// Cloneable; every clone feeds the same session. Each method returns `false` once
/// the transport has been dropped.
#[derive(Debug, Clone)]
pub struct TransportFeed {
    tx: UnboundedSender<TransportEvent>,
    wakeup: Arc<Notify>,
}

impl TransportFeed {
    /// Delivers one transport event.
    pub fn send(&self, event: TransportEvent) -> bool {
        let delivered = self.tx.send(event).is_ok();
        if delivered {
            self.wakeup.notify_one();
        }
        delivered
    }

    /// The data channel opened.
    pub fn open(&self) -> bool {
        self.send(TransportEvent::Open)
    }

    /// The data channel closed.
    pub fn close(&self) -> bool {
        self.send(TransportEvent::Close)
    }

    /// The data channel failed.
    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.send(TransportEvent::Error {
            reason: reason.into(),
        })
    }

    /// A record arrived already parsed.
    pub fn data(&self, record: Value) -> bool {
        self.send(TransportEvent::Data(record))
    }

    /// A record arrived as raw bytes.
    pub fn raw(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.send(TransportEvent::RawData(bytes.into()))
    }

    /// Returns `true` once the receiving transport has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A [`Transport`] whose events are pushed in through a [`TransportFeed`].
#[derive(Debug)]
pub struct ChannelTransport {
    rx: UnboundedReceiver<TransportEvent>,
}

impl Transport for ChannelTransport {
    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        // Empty and disconnected both mean nothing more to deliver right now.
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl ChannelTransport {
    /// Number of events waiting to be polled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Stops a running [`drive`] future.
///
/// Dropping the handle cancels the driver as well.
#[derive(Debug)]
pub struct DriverHandle {
    cancel: oneshot::Sender<()>,
}

impl DriverHandle {
    /// Asks the driver to stop. The driver shuts the session down and resolves to it.
    pub fn cancel(self) {
        // Err only means the driver already finished.
        let _ = self.cancel.send(());
    }

    /// Returns `true` while the driver future is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_closed()
    }
}

/// Drives `session` until cancelled.
///
/// `feed` must be the sending half of the [`ChannelTransport`] the session was started
/// on; the driver uses it to learn when new events are waiting. The returned future
/// polls the session each time events arrive and each time the session's next
/// liveness poll falls due. On cancellation it calls
/// [`SpectatorSession::shutdown`] and resolves to the session.
///
/// The future is not spawned; await it, `join!` it, or hand it to a `LocalSet`.
pub fn drive(
    session: SpectatorSession,
    feed: &TransportFeed,
) -> (DriverHandle, impl Future<Output = SpectatorSession>) {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let wakeup = Arc::clone(&feed.wakeup);
    (
        DriverHandle { cancel: cancel_tx },
        run(session, wakeup, cancel_rx),
    )
}

async fn run(
    mut session: SpectatorSession,
    wakeup: Arc<Notify>,
    mut cancel: oneshot::Receiver<()>,
) -> SpectatorSession {
    // Anything queued before the driver started.
    session.poll_at(now());
    loop {
        let next_poll = session
            .next_liveness_poll()
            .map(TokioInstant::from_std)
            .unwrap_or_else(far_future);
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            () = wakeup.notified() => {
                trace!("transport events ready");
                session.poll_at(now());
            },
            () = sleep_until(next_poll) => {
                session.poll_at(now());
            },
        }
        if session.is_shut_down() {
            break;
        }
    }
    debug!("spectator driver stopping");
    session.shutdown();
    session
}

fn now() -> web_time::Instant {
    TokioInstant::now().into_std()
}

/// A deadline that never fires in practice, used while the liveness poll is cancelled.
fn far_future() -> TokioInstant {
    TokioInstant::now() + std::time::Duration::from_secs(86_400 * 365)
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
    use crate::{ConnectionStatus, SessionBuilder};
    use serde_json::json;
    use std::time::Duration;

    fn sync_record() -> Value {
        json!({
            "type": "SYNC",
            "players": [{ "id": 1, "name": "Ana", "color": "#e74c3c", "pos": 4, "rolls": 2 }],
            "currentTurnIndex": 0
        })
    }

    #[test]
    fn channel_transport_drains_in_order() {
        let (feed, mut transport) = channel_transport();
        assert!(feed.open());
        assert!(feed.data(json!({ "type": "PING" })));
        assert!(feed.close());
        assert_eq!(transport.pending(), 3);
        let events = transport.poll_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TransportEvent::Open);
        assert_eq!(events[2], TransportEvent::Close);
        assert!(transport.poll_events().is_empty());
    }

    #[test]
    fn feed_reports_dropped_transport() {
        let (feed, transport) = channel_transport();
        drop(transport);
        assert!(feed.is_closed());
        assert!(!feed.open());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_applies_events_and_stops_on_cancel() {
        let (feed, transport) = channel_transport();
        let session = SessionBuilder::new()
            .start_session_at(transport, now())
            .unwrap();
        let (handle, driver) = drive(session, &feed);

        let script = async move {
            feed.open();
            feed.data(sync_record());
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(handle.is_running());
            handle.cancel();
        };

        let (session, ()) = tokio::join!(driver, script);
        assert!(session.is_shut_down());
        assert_eq!(session.mirror().players.len(), 1);
        assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_marks_silent_host_stale() {
        let (feed, transport) = channel_transport();
        let session = SessionBuilder::new()
            .start_session_at(transport, now())
            .unwrap();
        let (handle, driver) = drive(session, &feed);

        let script = async move {
            feed.open();
            feed.data(sync_record());
            // Default liveness: 5s poll, 7s timeout. The poll at 10s sees 10s of silence.
            tokio::time::sleep(Duration::from_millis(10_500)).await;
            handle.cancel();
        };

        let (mut session, ()) = tokio::join!(driver, script);
        let stale = session
            .events()
            .any(|event| matches!(event, crate::SpectatorEvent::HostStale { .. }));
        assert!(stale);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_driver() {
        let (feed, transport) = channel_transport();
        let session = SessionBuilder::new()
            .start_session_at(transport, now())
            .unwrap();
        let (handle, driver) = drive(session, &feed);
        drop(handle);
        let session = driver.await;
        assert!(session.is_shut_down());
    }
}

use std::collections::vec_deque::Drain;
use std::iter::FusedIterator;

use crate::SpectatorEvent;

/// A zero-allocation opaque iterator that drains events from a session.
///
/// This type wraps the internal event queue drain, providing a stable public API
/// that doesn't expose `std::collections::vec_deque::Drain` directly. It implements
/// [`Iterator`], [`DoubleEndedIterator`], [`ExactSizeIterator`], and [`FusedIterator`].
///
/// Obtain an `EventDrain` by calling [`SpectatorSession::events()`].
///
/// # Examples
///
/// ```ignore
/// for event in session.events() {
///     match event {
///         SpectatorEvent::BoardRequired => build_board(),
///         SpectatorEvent::MirrorUpdated { .. } => render(session.mirror()),
///         _ => {}
///     }
/// }
/// ```
///
/// [`SpectatorSession::events()`]: crate::SpectatorSession::events
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct EventDrain<'a> {
    inner: Drain<'a, SpectatorEvent>,
}

impl<'a> EventDrain<'a> {
    pub(crate) fn from_drain(drain: Drain<'a, SpectatorEvent>) -> Self {
        Self { inner: drain }
    }
}

impl Iterator for EventDrain<'_> {
    type Item = SpectatorEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for EventDrain<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for EventDrain<'_> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl FusedIterator for EventDrain<'_> {}

impl std::fmt::Debug for EventDrain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDrain")
            .field("remaining", &self.len())
            .finish()
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
    use crate::ConnectionStatus;
    use std::collections::VecDeque;

    fn status(connected: bool) -> SpectatorEvent {
        SpectatorEvent::StatusChanged {
            status: if connected {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            },
        }
    }

    fn queue() -> VecDeque<SpectatorEvent> {
        VecDeque::from(vec![status(true), SpectatorEvent::BoardRequired, status(false)])
    }

    #[test]
    fn drain_yields_all_events_in_order() {
        let mut queue = queue();
        let events: Vec<_> = EventDrain::from_drain(queue.drain(..)).collect();
        assert_eq!(
            events,
            vec![status(true), SpectatorEvent::BoardRequired, status(false)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_is_fused() {
        let mut queue = VecDeque::from(vec![SpectatorEvent::HostResumed]);
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert!(drain.next().is_some());
        assert!(drain.next().is_none());
        assert!(drain.next().is_none());
    }

    #[test]
    fn double_ended_iteration() {
        let mut queue = queue();
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert_eq!(drain.next_back(), Some(status(false)));
        assert_eq!(drain.next(), Some(status(true)));
        assert_eq!(drain.next_back(), Some(SpectatorEvent::BoardRequired));
        assert!(drain.next().is_none());
    }

    #[test]
    fn exact_size_is_accurate() {
        let mut queue = queue();
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert_eq!(drain.len(), 3);
        let _ = drain.next();
        assert_eq!(drain.len(), 2);
        assert!(format!("{drain:?}").contains("remaining: 2"));
    }
}

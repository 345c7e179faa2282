//! Host liveness detection.
//!
//! An open data channel does not prove the host is still there: a host whose tab
//! was closed or whose network dropped can leave the channel nominally open for a
//! long time. The monitor here watches the gap since the last accepted message
//! instead, and reports the host stale once that gap exceeds the configured
//! timeout.
//!
//! All time is passed in explicitly, which keeps the monitor deterministic under
//! test.
//!
//! ```
//! use ladderwatch::{LivenessClock, LivenessConfig, LivenessMonitor, LivenessTransition};
//! use web_time::{Duration, Instant};
//!
//! let t0 = Instant::now();
//! let clock = LivenessClock::new(t0);
//! let mut monitor = LivenessMonitor::new(LivenessConfig::default(), t0);
//!
//! assert_eq!(monitor.poll(t0 + Duration::from_secs(5), &clock, true), None);
//! assert!(matches!(
//!     monitor.poll(t0 + Duration::from_secs(10), &clock, true),
//!     Some(LivenessTransition::WentStale { .. })
//! ));
//! ```

use tracing::{debug, trace};
use web_time::{Duration, Instant};

use crate::sessions::config::LivenessConfig;

/// Timestamp of the last accepted message from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessClock {
    last_signal: Instant,
}

impl LivenessClock {
    /// Starts the clock at `now`, as if the host had just spoken.
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self { last_signal: now }
    }

    /// Records host traffic at `now`.
    ///
    /// A timestamp earlier than the current one is ignored.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_signal {
            self.last_signal = now;
        }
    }

    /// Restarts the clock for a fresh connection.
    ///
    /// Besides [`touch`](Self::touch), this is the only way the clock moves, and the
    /// session calls it only when the host channel opens. Silence measured across a
    /// reconnect would belong to the previous connection, so a new channel starts
    /// its silence from the moment it opened.
    pub fn reset(&mut self, now: Instant) {
        self.last_signal = now;
    }

    /// When the host last said anything.
    #[must_use]
    pub const fn last_signal(&self) -> Instant {
        self.last_signal
    }

    /// How long the host has been silent as of `now`.
    #[must_use]
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_signal)
    }
}

/// Whether the host is considered present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LivenessState {
    /// The host spoke within the timeout.
    #[default]
    Live,
    /// The host has been silent past the timeout.
    Stale,
}

/// A state change observed by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessTransition {
    /// `Live -> Stale`.
    WentStale {
        /// Silence measured at the poll.
        silent_for: Duration,
    },
    /// `Stale -> Live`.
    Resumed,
}

/// A fixed-interval schedule that can be cancelled.
///
/// Once cancelled, the schedule is never due again until restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PollSchedule {
    /// A schedule whose first poll is one interval after `start`.
    #[must_use]
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_due: Some(start + interval),
        }
    }

    /// Time between polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next poll is due, or `None` once cancelled.
    #[must_use]
    pub const fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Whether a poll should run at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Records a poll at `now` and schedules the next one.
    pub fn advance(&mut self, now: Instant) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval);
        }
    }

    /// Stops the schedule.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.next_due.is_none()
    }

    /// Starts the schedule over from `start`.
    pub fn restart(&mut self, start: Instant) {
        self.next_due = Some(start + self.interval);
    }
}

/// Two-state monitor driven by a [`PollSchedule`].
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    timeout: Duration,
    state: LivenessState,
    schedule: PollSchedule,
}

impl LivenessMonitor {
    /// Creates a `Live` monitor whose first poll is one interval after `start`.
    #[must_use]
    pub fn new(config: LivenessConfig, start: Instant) -> Self {
        Self {
            timeout: config.timeout,
            state: LivenessState::Live,
            schedule: PollSchedule::new(config.poll_interval, start),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LivenessState {
        self.state
    }

    /// Silence threshold.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The poll schedule.
    #[must_use]
    pub const fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    /// Runs a poll if one is due at `now`.
    ///
    /// `transport_open` is whether the data channel is currently open. A host on a
    /// closed channel is already shown as disconnected, so it is never also
    /// reported stale.
    pub fn poll(
        &mut self,
        now: Instant,
        clock: &LivenessClock,
        transport_open: bool,
    ) -> Option<LivenessTransition> {
        if !self.schedule.is_due(now) {
            return None;
        }
        self.schedule.advance(now);
        self.evaluate(now, clock, transport_open)
    }

    /// Compares the clock against the timeout immediately, ignoring the schedule.
    pub fn evaluate(
        &mut self,
        now: Instant,
        clock: &LivenessClock,
        transport_open: bool,
    ) -> Option<LivenessTransition> {
        let silence = clock.silence(now);
        trace!(silence_ms = silence.as_millis(), state = ?self.state, "liveness poll");
        match self.state {
            LivenessState::Live if transport_open && silence > self.timeout => {
                debug!(silence_ms = silence.as_millis(), "host went silent");
                self.state = LivenessState::Stale;
                Some(LivenessTransition::WentStale {
                    silent_for: silence,
                })
            },
            LivenessState::Stale if silence <= self.timeout => {
                debug!(silence_ms = silence.as_millis(), "host traffic resumed");
                self.state = LivenessState::Live;
                Some(LivenessTransition::Resumed)
            },
            _ => None,
        }
    }

    /// Returns to `Live` and restarts the schedule from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.state = LivenessState::Live;
        self.schedule.restart(now);
    }

    /// Cancels further polls. The current state is kept.
    pub fn cancel(&mut self) {
        self.schedule.cancel();
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

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn monitor(t0: Instant) -> LivenessMonitor {
        LivenessMonitor::new(LivenessConfig::default(), t0)
    }

    #[test]
    fn clock_never_moves_backwards() {
        let t0 = Instant::now();
        let mut clock = LivenessClock::new(t0 + secs(3));
        clock.touch(t0);
        assert_eq!(clock.last_signal(), t0 + secs(3));
        assert_eq!(clock.silence(t0), Duration::ZERO);
        clock.reset(t0);
        assert_eq!(clock.last_signal(), t0);
    }

    #[test]
    fn schedule_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut schedule = PollSchedule::new(secs(5), t0);
        assert!(!schedule.is_due(t0 + secs(4)));
        assert!(schedule.is_due(t0 + secs(5)));
        schedule.advance(t0 + secs(5));
        assert_eq!(schedule.next_due(), Some(t0 + secs(10)));
        assert!(!schedule.is_due(t0 + secs(9)));
    }

    #[test]
    fn cancelled_schedule_stays_cancelled() {
        let t0 = Instant::now();
        let mut schedule = PollSchedule::new(secs(5), t0);
        schedule.cancel();
        assert!(schedule.is_cancelled());
        assert!(!schedule.is_due(t0 + secs(60)));
        schedule.advance(t0 + secs(60));
        assert!(schedule.is_cancelled());
        schedule.restart(t0);
        assert!(schedule.is_due(t0 + secs(5)));
    }

    #[test]
    fn silence_past_timeout_goes_stale() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert_eq!(m.poll(t0 + secs(8), &clock, true), Some(LivenessTransition::WentStale {
            silent_for: secs(8)
        }));
        assert_eq!(m.state(), LivenessState::Stale);
    }

    #[test]
    fn silence_exactly_at_timeout_is_still_live() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert_eq!(m.evaluate(t0 + secs(7), &clock, true), None);
        assert_eq!(m.state(), LivenessState::Live);
    }

    #[test]
    fn traffic_inside_window_prevents_transition() {
        let t0 = Instant::now();
        let mut clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        for step in 1..=6 {
            let now = t0 + secs(step * 5);
            clock.touch(now - secs(1));
            assert_eq!(m.poll(now, &clock, true), None);
        }
        assert_eq!(m.state(), LivenessState::Live);
    }

    #[test]
    fn no_poll_before_due() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert_eq!(m.poll(t0 + secs(4), &clock, true), None);
        assert_eq!(m.state(), LivenessState::Live);
    }

    #[test]
    fn closed_channel_is_not_reported_stale() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert_eq!(m.poll(t0 + secs(30), &clock, false), None);
        assert_eq!(m.state(), LivenessState::Live);
    }

    #[test]
    fn stale_recovers_when_traffic_returns() {
        let t0 = Instant::now();
        let mut clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert!(m.poll(t0 + secs(10), &clock, true).is_some());

        clock.touch(t0 + secs(12));
        assert_eq!(m.poll(t0 + secs(15), &clock, true), Some(LivenessTransition::Resumed));
        assert_eq!(m.state(), LivenessState::Live);
    }

    #[test]
    fn clock_reset_starts_silence_at_open() {
        let t0 = Instant::now();
        let mut clock = LivenessClock::new(t0);
        clock.touch(t0 + secs(2));
        clock.reset(t0 + secs(30));
        assert_eq!(clock.last_signal(), t0 + secs(30));
        assert_eq!(clock.silence(t0 + secs(33)), secs(3));
    }

    #[test]
    fn reset_returns_to_live_and_restarts_schedule() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        assert!(m.poll(t0 + secs(10), &clock, true).is_some());
        m.reset(t0 + secs(11));
        assert_eq!(m.state(), LivenessState::Live);
        assert_eq!(m.schedule().next_due(), Some(t0 + secs(16)));
    }

    #[test]
    fn cancel_stops_polling() {
        let t0 = Instant::now();
        let clock = LivenessClock::new(t0);
        let mut m = monitor(t0);
        m.cancel();
        assert_eq!(m.poll(t0 + secs(100), &clock, true), None);
        assert_eq!(m.state(), LivenessState::Live);
    }
}

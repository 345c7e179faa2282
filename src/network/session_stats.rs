/// The `SessionStats` struct counts what a spectator session has received and what it dropped.
///
/// Counters are cumulative for the lifetime of the session and are not reset
/// on reconnect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "SessionStats should be inspected or used after being queried"]
pub struct SessionStats {
    /// Records that decoded into a known or unrecognized message kind.
    pub messages_accepted: u64,
    /// Full state replacements applied to the mirror.
    pub full_syncs: u64,
    /// Position patches applied to the mirror.
    pub position_patches: u64,
    /// Viewer count updates applied to the mirror.
    pub viewer_counts: u64,
    /// Heartbeats received.
    pub heartbeats: u64,
    /// Presentation events forwarded.
    pub presentation_events: u64,

    // === Dropped input ===
    /// Well-formed records whose kind this client does not know.
    pub unrecognized: u64,
    /// Records that could not be decoded at all.
    ///
    /// These do not refresh the liveness clock.
    pub decode_failures: u64,
    /// Position patches naming a player absent from the mirror.
    pub stale_patches: u64,
    /// Position patches that arrived before any full sync.
    pub patches_before_sync: u64,
}

impl SessionStats {
    /// Creates a new `SessionStats` instance with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records that were received but had no effect on the mirror
    /// or the presentation layer.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.unrecognized + self.decode_failures + self.stale_patches + self.patches_before_sync
    }
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            messages_accepted,
            full_syncs,
            position_patches,
            viewer_counts,
            heartbeats,
            presentation_events,
            unrecognized,
            decode_failures,
            stale_patches,
            patches_before_sync,
        } = self;

        write!(
            f,
            "SessionStats {{ accepted: {}, full_syncs: {}, patches: {}, viewer_counts: {}, heartbeats: {}, presentation: {}",
            messages_accepted, full_syncs, position_patches, viewer_counts, heartbeats, presentation_events
        )?;

        if self.dropped() > 0 {
            write!(
                f,
                ", unrecognized: {}, decode_failures: {}, stale_patches: {}, patches_before_sync: {}",
                unrecognized, decode_failures, stale_patches, patches_before_sync
            )?;
        }

        write!(f, " }}")
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
    fn test_session_stats_default() {
        let stats = SessionStats::new();
        assert_eq!(stats, SessionStats::default());
        assert_eq!(stats.messages_accepted, 0);
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn test_dropped_sums_every_drop_counter() {
        let stats = SessionStats {
            unrecognized: 1,
            decode_failures: 2,
            stale_patches: 3,
            patches_before_sync: 4,
            ..SessionStats::default()
        };
        assert_eq!(stats.dropped(), 10);
    }

    #[test]
    fn test_display_hides_drop_counters_when_clean() {
        let stats = SessionStats {
            messages_accepted: 3,
            full_syncs: 1,
            heartbeats: 2,
            ..SessionStats::default()
        };
        let display = stats.to_string();
        assert!(display.contains("accepted: 3"));
        assert!(!display.contains("decode_failures"));
    }

    #[test]
    fn test_display_shows_drop_counters() {
        let stats = SessionStats {
            stale_patches: 1,
            ..SessionStats::default()
        };
        let display = stats.to_string();
        assert!(display.contains("stale_patches: 1"));
        assert!(display.ends_with(" }"));
    }
}

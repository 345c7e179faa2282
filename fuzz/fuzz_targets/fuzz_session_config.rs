//! Fuzz target for session configuration.
//!
//! This target tests that arbitrary configuration values are handled gracefully
//! by the SessionBuilder and the liveness and spectator config types.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary configuration values
//! - Validation and session start agree on what is accepted

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ladderwatch::{
    BoardLayout, LivenessConfig, Portal, SessionBuilder, SpectatorConfig, Transport,
    TransportEvent,
};
use std::time::Duration;

/// Arbitrary configuration inputs for the session builder
#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    poll_interval_ms: u32,
    timeout_ms: u32,
    columns: u8,
    rows: u8,
    portals: Vec<(u16, u16)>,
    max_event_queue_size: u16,
    room_id: String,
}

struct Idle;

impl Transport for Idle {
    fn poll_events(&mut self) -> Vec<TransportEvent> {
        Vec::new()
    }
}

fuzz_target!(|config: FuzzConfig| {
    let liveness = LivenessConfig {
        poll_interval: Duration::from_millis(u64::from(config.poll_interval_ms)),
        timeout: Duration::from_millis(u64::from(config.timeout_ms)),
    };
    let board = BoardLayout {
        columns: u32::from(config.columns),
        rows: u32::from(config.rows),
        portals: config
            .portals
            .iter()
            .map(|&(start, end)| Portal::new(u32::from(start), u32::from(end)))
            .collect(),
    };
    let spectator = SpectatorConfig {
        board,
        max_event_queue_size: usize::from(config.max_event_queue_size),
    };

    let expected_ok = liveness.validate().is_ok() && spectator.validate().is_ok();

    let Ok(builder) = SessionBuilder::new().with_room_id(&config.room_id) else {
        return;
    };
    let started = builder
        .with_liveness_config(liveness)
        .with_spectator_config(spectator)
        .start_session(Idle);
    assert_eq!(started.is_ok(), expected_ok);
});

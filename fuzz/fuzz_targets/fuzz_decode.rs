//! Fuzz target for host record decoding.
//!
//! This target tests that arbitrary bytes cannot crash the decoder, and that
//! whatever the decoder accepts keeps the mirror consistent.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary input
//! - Accepted full syncs always have an in-range turn index
//! - Reconciling accepted messages never breaks mirror invariants

#![no_main]

use libfuzzer_sys::fuzz_target;

use ladderwatch::telemetry::InvariantChecker;
use ladderwatch::{decode_bytes, HostMessage, Reconciler};

fuzz_target!(|data: &[u8]| {
    let mut reconciler = Reconciler::new();

    // Treat the input as newline-separated records so sequences get exercised too.
    for line in data.split(|byte| *byte == b'\n') {
        let Ok(message) = decode_bytes(line) else {
            continue;
        };
        if let HostMessage::FullSync(sync) = &message {
            assert!(sync.players.is_empty() || sync.current_turn_index < sync.players.len());
        }
        reconciler.apply(message);
        assert!(reconciler.mirror().check_invariants().is_ok());
    }

    // Derived views must never panic either.
    let mirror = reconciler.mirror();
    let _ = mirror.turn_indicator().label();
    let _ = mirror.leaderboard();
});

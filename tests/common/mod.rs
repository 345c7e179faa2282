//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `fixtures`: Wire records and player builders for host messages
//! - `test_utils`: A scripted transport, a recording observer and timing helpers
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::fixtures::{player_json, sync_json};
//! use common::{ScriptedTransport, RecordingObserver};
//! ```

pub mod fixtures;
pub mod test_utils;

// Re-export commonly used items for convenience.
// Not every integration crate uses every helper.
#[allow(unused_imports)]
pub use test_utils::{
    after, start_session, start_session_with, ObservedCall, RecordingObserver,
    ScriptedTransport, DEFAULT_TIMEOUT,
};

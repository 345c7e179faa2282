//! Replays a recorded host broadcast through a spectator session.
//!
//! The input is a JSON-lines file with one host record per line, as captured from
//! the data channel. Records are fed at a fixed pace through the Tokio driver, so
//! liveness behaves as it would against a live host.
//!
//! Run with: cargo run --example replay -- --records broadcast.jsonl --gap-ms 250

use clap::Parser;
use ladderwatch::tokio_driver::{channel_transport, drive};
use ladderwatch::{
    board::token_offset, BoardLayout, LastRoomStore, LivenessConfig, RoomId, SessionBuilder,
    SpectatorObserver,
};
use ladderwatch::telemetry::{ProtocolViolation, ViolationObserver};
use ladderwatch::{ConnectionStatus, GameMirror, MirrorChange, PresentationEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
struct Opt {
    /// JSON-lines file of host records.
    #[arg(short, long)]
    records: PathBuf,
    /// Pause between records, in milliseconds.
    #[arg(short, long, default_value_t = 250)]
    gap_ms: u64,
    /// How long to keep watching after the last record, in seconds.
    #[arg(short, long, default_value_t = 0)]
    linger_secs: u64,
    /// Liveness poll interval, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    poll_ms: u64,
    /// Liveness timeout, in milliseconds.
    #[arg(long, default_value_t = 7_000)]
    timeout_ms: u64,
    /// Room the recording came from.
    #[arg(long)]
    room: Option<String>,
    /// Where to remember the room for next time.
    #[arg(long)]
    store: Option<PathBuf>,
}

/// Logs what a renderer would draw.
struct LogRenderer {
    board: BoardLayout,
}

impl SpectatorObserver for LogRenderer {
    fn on_board_required(&mut self) {
        info!(
            tiles = self.board.tile_count(),
            portals = self.board.portals.len(),
            "building board"
        );
    }

    fn on_mirror_updated(&mut self, mirror: &GameMirror, change: &MirrorChange) {
        info!(?change, turn = %mirror.turn_indicator().label(), "mirror updated");
        if let MirrorChange::Position { player_id, current, .. } = change {
            if let Some(portal) = self.board.portal_from(*current) {
                info!(%player_id, ?portal, "player stands on a portal");
            }
            let cell = self.board.tile_cell(*current);
            info!(%player_id, ?cell, offset = ?token_offset(*player_id), "token moved");
        }
    }

    fn on_presentation_event(&mut self, event: &PresentationEvent) {
        info!(?event, "presentation cue");
    }

    fn on_connection_status(&mut self, status: ConnectionStatus) {
        info!(?status, join_prompt = !status.is_connected(), "connection status");
    }
}

/// Emits each violation as one JSON line, ready for a log collector.
struct JsonViolationLog;

impl ViolationObserver for JsonViolationLog {
    fn on_violation(&self, violation: &ProtocolViolation) {
        match violation.to_json() {
            Some(json) => warn!(target: "ladderwatch::violations", "{json}"),
            None => warn!(%violation, "violation"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // configure logging: output ladderwatch and replay logs to standard out
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    )?;

    // read cmd line arguments
    let opt = Opt::parse();

    let room = match (&opt.room, &opt.store) {
        (Some(room), _) => Some(RoomId::parse(room)?),
        (None, Some(path)) => LastRoomStore::new(path).load()?,
        (None, None) => None,
    };

    let contents = std::fs::read_to_string(&opt.records)?;
    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(line = line_no + 1, %err, "skipping unparsable line"),
        }
    }

    let (feed, transport) = channel_transport();
    let mut builder = SessionBuilder::new().with_liveness_config(LivenessConfig {
        poll_interval: Duration::from_millis(opt.poll_ms),
        timeout: Duration::from_millis(opt.timeout_ms),
    });
    if let Some(room) = &room {
        builder = builder.with_room_id(room.as_str())?;
    }
    let session = builder
        .with_violation_observer(Arc::new(JsonViolationLog))
        .with_observer(LogRenderer {
            board: BoardLayout::standard(),
        })
        .start_session(transport)?;
    let (handle, driver) = drive(session, &feed);

    let gap = Duration::from_millis(opt.gap_ms);
    let linger = Duration::from_secs(opt.linger_secs);
    let host = async move {
        feed.open();
        for record in records {
            feed.data(record);
            tokio::time::sleep(gap).await;
        }
        tokio::time::sleep(linger).await;
        feed.close();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    };

    let (session, ()) = tokio::join!(driver, host);

    for row in session.mirror().leaderboard() {
        info!(
            name = %row.name,
            pos = row.pos,
            rolls = row.rolls,
            current = row.is_current,
            finished = row.finished,
            "leaderboard"
        );
    }
    info!(stats = %session.stats(), "replay finished");

    if let (Some(room), Some(path)) = (session.room_id(), &opt.store) {
        LastRoomStore::new(path).save(room)?;
    }
    Ok(())
}

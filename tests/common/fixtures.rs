//! Host wire records used across integration tests.
//!
//! Every helper produces the exact JSON shape the host broadcasts.

#![allow(dead_code, clippy::expect_used, clippy::indexing_slicing)]

use ladderwatch::{Player, PlayerId};
use serde_json::{json, Value};

/// A player record in wire form.
pub fn player_json(id: u32, name: &str, pos: u32, rolls: i32) -> Value {
    json!({
        "id": id,
        "name": name,
        "color": color_for(id),
        "pos": pos,
        "rolls": rolls,
    })
}

/// A `SYNC` record with the given players and active index.
pub fn sync_json(players: &[Value], current_turn_index: usize) -> Value {
    json!({
        "type": "SYNC",
        "players": players,
        "currentTurnIndex": current_turn_index,
    })
}

/// A `SYNC` record that also carries a viewer count.
pub fn sync_with_viewers_json(players: &[Value], current_turn_index: usize, viewers: u32) -> Value {
    let mut record = sync_json(players, current_turn_index);
    record["viewerCount"] = json!(viewers);
    record
}

/// A `SYNC_POSITION` record.
pub fn position_json(player_id: u32, new_pos: u32) -> Value {
    json!({ "type": "SYNC_POSITION", "playerId": player_id, "newPos": new_pos })
}

/// A `VIEWER_COUNT` record.
pub fn viewer_count_json(count: u32) -> Value {
    json!({ "type": "VIEWER_COUNT", "count": count })
}

/// A `HEARTBEAT` record.
pub fn heartbeat_json() -> Value {
    json!({ "type": "HEARTBEAT" })
}

/// The single-player room from a freshly created game: nobody has rolls yet.
pub fn fresh_room() -> Value {
    sync_json(&[player_json(1, "Ana", 0, 0)], 0)
}

/// A two-player game in progress, Ben to move.
pub fn game_in_progress() -> Value {
    sync_json(
        &[player_json(1, "Ana", 12, 3), player_json(2, "Ben", 7, 2)],
        1,
    )
}

/// The typed form of [`player_json`].
pub fn player(id: u32, name: &str, pos: u32, rolls: i32) -> Player {
    Player {
        id: PlayerId::new(id),
        name: name.to_owned(),
        color: color_for(id).to_owned(),
        pos,
        rolls,
        finished: false,
        total_rolls_given: 0,
        escapes: 0,
    }
}

fn color_for(id: u32) -> &'static str {
    const COLORS: [&str; 4] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f"];
    COLORS[id as usize % COLORS.len()]
}

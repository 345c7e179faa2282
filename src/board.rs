//! Static board geometry.
//!
//! The board is a grid of numbered tiles laid out serpentine style. Tile 1 sits
//! in the bottom-right corner and the bottom row counts right to left; every row
//! above reverses direction. Portals connect two tiles; a portal that climbs is a
//! ladder, one that descends is a snake. The host applies portals when it moves a
//! player; the spectator only needs them to draw the board.

use crate::LadderError;

/// Whether a portal moves a player up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalKind {
    /// Ends on a higher tile.
    Ladder,
    /// Ends on a lower tile.
    Snake,
}

/// A connection between two tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Portal {
    /// Tile the portal starts on.
    pub start: u32,
    /// Tile the portal delivers the player to.
    pub end: u32,
}

impl Portal {
    /// Creates a portal between two tiles.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Ladder if the portal climbs, snake otherwise.
    #[must_use]
    pub const fn kind(&self) -> PortalKind {
        if self.end > self.start {
            PortalKind::Ladder
        } else {
            PortalKind::Snake
        }
    }
}

/// Portals of the standard 64-tile board.
const STANDARD_PORTALS: [Portal; 8] = [
    Portal::new(2, 18),
    Portal::new(10, 30),
    Portal::new(25, 45),
    Portal::new(42, 59),
    Portal::new(22, 4),
    Portal::new(37, 15),
    Portal::new(50, 32),
    Portal::new(62, 40),
];

/// Grid dimensions and portals of a board.
///
/// # Examples
///
/// ```
/// use ladderwatch::{BoardLayout, PortalKind};
///
/// let board = BoardLayout::standard();
/// assert_eq!(board.tile_count(), 64);
/// // Tile 1 is bottom-right; the top row runs left to right up to 64.
/// assert_eq!(board.tile_cell(1), Some((7, 7)));
/// assert_eq!(board.tile_cell(64), Some((0, 7)));
/// assert_eq!(board.portal_from(22).map(|p| p.kind()), Some(PortalKind::Snake));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout {
    /// Tiles per row.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    /// Every portal on the board.
    pub portals: Vec<Portal>,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::standard()
    }
}

impl BoardLayout {
    /// The 8x8 board with its eight portals.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            columns: 8,
            rows: 8,
            portals: STANDARD_PORTALS.to_vec(),
        }
    }

    /// Number of tiles on the board.
    #[must_use]
    pub const fn tile_count(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }

    /// Whether `pos` names a tile. Position `0` (off the board) is not a tile.
    #[must_use]
    pub const fn contains(&self, pos: u32) -> bool {
        pos >= 1 && pos <= self.tile_count()
    }

    /// Grid cell `(row, col)` of a tile, counted from the top-left corner.
    #[must_use]
    pub const fn tile_cell(&self, tile: u32) -> Option<(u32, u32)> {
        if !self.contains(tile) {
            return None;
        }
        let offset = tile - 1;
        let row_from_bottom = offset / self.columns;
        let along = offset % self.columns;
        let col = if row_from_bottom % 2 == 0 {
            self.columns - 1 - along
        } else {
            along
        };
        Some((self.rows - 1 - row_from_bottom, col))
    }

    /// The portal starting on `tile`, if any.
    #[must_use]
    pub fn portal_from(&self, tile: u32) -> Option<&Portal> {
        self.portals.iter().find(|p| p.start == tile)
    }

    /// Portals of one kind.
    pub fn portals_of(&self, kind: PortalKind) -> impl Iterator<Item = &Portal> + '_ {
        self.portals.iter().filter(move |p| p.kind() == kind)
    }

    /// Checks that the grid is non-empty and every portal joins two distinct tiles.
    pub fn validate(&self) -> Result<(), LadderError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(LadderError::InvalidConfig {
                field: "board",
                reason: format!("grid must be non-empty, got {}x{}", self.columns, self.rows),
            });
        }
        for (i, portal) in self.portals.iter().enumerate() {
            if !self.contains(portal.start) || !self.contains(portal.end) {
                return Err(LadderError::InvalidConfig {
                    field: "board.portals",
                    reason: format!(
                        "portal {}->{} leaves the {}-tile board",
                        portal.start,
                        portal.end,
                        self.tile_count()
                    ),
                });
            }
            if portal.start == portal.end {
                return Err(LadderError::InvalidConfig {
                    field: "board.portals",
                    reason: format!("portal on tile {} goes nowhere", portal.start),
                });
            }
            if self.portals[..i].iter().any(|p| p.start == portal.start) {
                return Err(LadderError::InvalidConfig {
                    field: "board.portals",
                    reason: format!("tile {} has more than one portal", portal.start),
                });
            }
        }
        Ok(())
    }
}

/// Pixel nudge for a player's token so tokens sharing a tile stay visible.
///
/// Returns `(dx, dy)`.
#[must_use]
pub const fn token_offset(id: crate::PlayerId) -> (u32, u32) {
    let id = id.as_u32();
    (id % 5 * 4, id / 5 * 4)
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
    use crate::PlayerId;

    #[test]
    fn standard_board_is_valid() {
        let board = BoardLayout::standard();
        assert!(board.validate().is_ok());
        assert_eq!(board.portals_of(PortalKind::Ladder).count(), 4);
        assert_eq!(board.portals_of(PortalKind::Snake).count(), 4);
    }

    #[test]
    fn tiles_snake_across_rows() {
        let board = BoardLayout::standard();
        // Bottom row runs right to left.
        assert_eq!(board.tile_cell(1), Some((7, 7)));
        assert_eq!(board.tile_cell(8), Some((7, 0)));
        // Second row runs left to right.
        assert_eq!(board.tile_cell(9), Some((6, 0)));
        assert_eq!(board.tile_cell(16), Some((6, 7)));
        assert_eq!(board.tile_cell(57), Some((0, 0)));
        assert_eq!(board.tile_cell(64), Some((0, 7)));
    }

    #[test]
    fn every_tile_has_a_distinct_cell() {
        let board = BoardLayout::standard();
        let mut cells: Vec<(u32, u32)> =
            (1..=64).map(|n| board.tile_cell(n).unwrap()).collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), 64);
    }

    #[test]
    fn off_board_positions() {
        let board = BoardLayout::standard();
        assert!(!board.contains(0));
        assert!(board.contains(64));
        assert!(!board.contains(65));
        assert_eq!(board.tile_cell(0), None);
        assert_eq!(board.tile_cell(65), None);
    }

    #[test]
    fn portal_classification() {
        assert_eq!(Portal::new(2, 18).kind(), PortalKind::Ladder);
        assert_eq!(Portal::new(62, 40).kind(), PortalKind::Snake);
        let board = BoardLayout::standard();
        assert_eq!(board.portal_from(10), Some(&Portal::new(10, 30)));
        assert!(board.portal_from(11).is_none());
    }

    #[test]
    fn invalid_boards_are_rejected() {
        let empty = BoardLayout {
            columns: 0,
            ..BoardLayout::standard()
        };
        assert!(empty.validate().is_err());

        let mut outside = BoardLayout::standard();
        outside.portals.push(Portal::new(63, 70));
        assert!(outside.validate().is_err());

        let mut doubled = BoardLayout::standard();
        doubled.portals.push(Portal::new(2, 5));
        assert!(doubled.validate().is_err());

        let mut looped = BoardLayout::standard();
        looped.portals.push(Portal::new(5, 5));
        assert!(looped.validate().is_err());
    }

    #[test]
    fn token_offsets_spread_ids() {
        assert_eq!(token_offset(PlayerId::new(0)), (0, 0));
        assert_eq!(token_offset(PlayerId::new(3)), (12, 0));
        assert_eq!(token_offset(PlayerId::new(7)), (8, 4));
    }
}

//! Coordinate value types.
//!
//! `Coord` is a point in a raster's native projected coordinate system.
//! `TileCoord` identifies a tile within a grid. The same type is used for
//! two distinct grids: the dataset-level grid of backing files and the
//! in-file grid of compressed tiles. The two spaces must never be mixed.

use serde::{Deserialize, Serialize};

/// A point in native projected units. May be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A (column, row) position within a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: i64,
    pub row: i64,
}

impl TileCoord {
    pub fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

//! Common types and capabilities shared across all dem-tiles crates.

pub mod coord;
pub mod error;
pub mod fs;
pub mod raster;

pub use coord::{Coord, TileCoord};
pub use error::{DemError, DemResult};
pub use fs::{DirFs, ReadAtFile, TileFs};
pub use raster::Raster;

//! Error types for dem-tiles crates.

use thiserror::Error;

/// Result type alias using DemError.
pub type DemResult<T> = Result<T, DemError>;

/// Primary error type for DEM operations.
///
/// A missing backing file is not represented here: it is surfaced as
/// `DemError::Io` with `std::io::ErrorKind::NotFound` at open time and
/// recovered by the tile-set layer, which converts it to NaN samples.
#[derive(Debug, Error)]
pub enum DemError {
    /// The file is a valid TIFF but does not match the supported profile
    /// (single-band tiled LZW float32 with integer scale and origin).
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file claims a layout its own metadata contradicts.
    #[error("malformed file: {0}")]
    MalformedFile(String),

    /// A tile read returned fewer bytes than its recorded byte count.
    #[error("short read: tile {tile} expected {expected} bytes, read {actual}")]
    ShortRead {
        tile: crate::TileCoord,
        expected: u64,
        actual: u64,
    },

    /// LZW decompression failed or produced a truncated tile.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// The geo-key directory is present but cannot be parsed.
    #[error("geo key parse error: {0}")]
    GeoKeys(String),

    #[error("projection error: {0}")]
    Projection(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemError {
    /// Whether this error is a not-found condition recoverable by the
    /// tile-set layer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DemError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

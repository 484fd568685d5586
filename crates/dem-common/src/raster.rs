//! The raster sampling capability.

use async_trait::async_trait;

use crate::{Coord, DemResult};

/// Anything that can be sampled at native coordinates.
///
/// Implemented both by a single open GeoTIFF file and by a whole tile set,
/// so consumers such as the bilinear interpolator work uniformly over one
/// file or an entire dataset. Missing coverage and no-data pixels are
/// reported as NaN, never as errors.
#[async_trait]
pub trait Raster: Send + Sync {
    /// Sample every coordinate, preserving input order. Implementations
    /// must return results identical to sampling each coordinate on its
    /// own, but are expected to group coordinates so each backing tile is
    /// decoded at most once per call.
    async fn samples(&self, coords: &[Coord]) -> DemResult<Vec<f64>>;

    /// Pixel size in native units, (x, y).
    fn scale(&self) -> (i64, i64);
}

//! Bilinear interpolation over any [`Raster`].
//!
//! Samples sit on the raster's integer grid; an elevation query lands
//! between them. Each query point reads the four surrounding grid corners
//! in a single batch and blends them by the point's fractional position
//! within the cell. A NaN corner (outside coverage or no-data) makes the
//! result NaN.

use dem_common::{Coord, DemResult, Raster};

/// Bilinearly interpolated values at fractional native coordinates.
///
/// All corner samples for the batch are fetched with one [`Raster::samples`]
/// call, so tile and decoder caching apply across query points.
pub async fn interpolate_bilinear(
    raster: &(impl Raster + ?Sized),
    points: &[(f64, f64)],
) -> DemResult<Vec<f64>> {
    let (scale_x, scale_y) = raster.scale();

    let mut corners = Vec::with_capacity(4 * points.len());
    let mut cells = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let x0 = scale_x * (x as i64 / scale_x);
        let y0 = scale_y * (y as i64 / scale_y);
        corners.push(Coord { x: x0, y: y0 });
        corners.push(Coord { x: x0 + scale_x, y: y0 });
        corners.push(Coord { x: x0, y: y0 + scale_y });
        corners.push(Coord {
            x: x0 + scale_x,
            y: y0 + scale_y,
        });
        cells.push((x0, y0));
    }

    let samples = raster.samples(&corners).await?;

    let mut values = Vec::with_capacity(points.len());
    for (index, (&(x, y), &(x0, y0))) in points.iter().zip(&cells).enumerate() {
        let corner = &samples[4 * index..4 * index + 4];
        let dx = (x - x0 as f64) / scale_x as f64;
        let dy = (y - y0 as f64) / scale_y as f64;
        values.push(
            corner[0] * (1.0 - dx) * (1.0 - dy)
                + corner[1] * dx * (1.0 - dy)
                + corner[2] * (1.0 - dx) * dy
                + corner[3] * dx * dy,
        );
    }
    Ok(values)
}

//! The elevation service facade.
//!
//! Combines a [`TileSet`] with the projection that turns WGS 84 query
//! coordinates into the tile set's native CRS, and interpolates between
//! grid samples so nearby queries do not step between pixel values.

use dem_common::DemResult;
use projection::LambertAzimuthalEqualArea;

use crate::interpolate::interpolate_bilinear;
use crate::router::TileSet;

pub struct ElevationService {
    tile_set: TileSet,
    projection: LambertAzimuthalEqualArea,
}

impl ElevationService {
    pub fn new(tile_set: TileSet, projection: LambertAzimuthalEqualArea) -> Self {
        Self {
            tile_set,
            projection,
        }
    }

    /// Interpolated elevations at native CRS coordinates, in meters. NaN
    /// where the dataset has no value.
    pub async fn elevations(&self, points: &[(f64, f64)]) -> DemResult<Vec<f64>> {
        interpolate_bilinear(&self.tile_set, points).await
    }

    pub async fn elevation(&self, x: f64, y: f64) -> DemResult<f64> {
        Ok(self.elevations(&[(x, y)]).await?[0])
    }

    /// Interpolated elevations at WGS 84 longitude/latitude coordinates.
    /// Fails on coordinates the projection cannot map; points that project
    /// outside the dataset come back NaN.
    pub async fn elevations_wgs84(&self, lon_lats: &[(f64, f64)]) -> DemResult<Vec<f64>> {
        let mut points = Vec::with_capacity(lon_lats.len());
        for &(lon, lat) in lon_lats {
            points.push(self.projection.forward(lon, lat)?);
        }
        self.elevations(&points).await
    }

    pub async fn elevation_wgs84(&self, lon: f64, lat: f64) -> DemResult<f64> {
        Ok(self.elevations_wgs84(&[(lon, lat)]).await?[0])
    }

    pub fn tile_set(&self) -> &TileSet {
        &self.tile_set
    }
}

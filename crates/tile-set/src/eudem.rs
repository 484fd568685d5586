//! The EU-DEM v1.1 dataset profile.
//!
//! EU-DEM v1.1 is distributed as 1000 km by 1000 km GeoTIFF files in
//! ETRS89-extended / LAEA Europe (EPSG:3035) at 25 m resolution, named
//! after the lower-left corner of the area they cover in units of 100 km,
//! for example `eu_dem_v11_E40N30.TIF` for the file whose lower-left
//! corner is at easting 4,000,000 m and northing 3,000,000 m. Not every
//! grid cell has a file; the sea is simply missing.

use std::sync::Arc;

use dem_common::{Coord, TileCoord, TileFs};
use projection::etrs89_laea;

use crate::elevation::ElevationService;
use crate::router::{TileSet, TileSetBuilder};

pub const EU_DEM_SRID: u32 = 3035;
pub const EU_DEM_SCALE: (i64, i64) = (25, 25);

const FILE_SPAN_METERS: i64 = 1_000_000;

/// The tile coordinate of the file covering a native coordinate. `None`
/// for negative coordinates, which no EU-DEM file covers.
pub fn eu_dem_tile_coord(coord: Coord) -> Option<TileCoord> {
    if coord.x < 0 || coord.y < 0 {
        return None;
    }
    Some(TileCoord {
        col: 10 * (coord.x / FILE_SPAN_METERS),
        row: 10 * (coord.y / FILE_SPAN_METERS),
    })
}

pub fn eu_dem_tile_filename(tile_coord: TileCoord) -> String {
    format!("eu_dem_v11_E{:02}N{:02}.TIF", tile_coord.col, tile_coord.row)
}

/// A [`TileSetBuilder`] preconfigured for an EU-DEM v1.1 directory.
pub fn eu_dem_tile_set(fs: Arc<dyn TileFs>) -> TileSetBuilder {
    TileSetBuilder::new(
        fs,
        EU_DEM_SRID,
        EU_DEM_SCALE,
        eu_dem_tile_coord,
        eu_dem_tile_filename,
    )
}

/// An [`ElevationService`] over an EU-DEM tile set, accepting WGS 84
/// coordinates via the matching EPSG:3035 projection.
pub fn eu_dem_elevation_service(tile_set: TileSet) -> ElevationService {
    ElevationService::new(tile_set, etrs89_laea())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_coordinates_to_files() {
        let tile_coord = eu_dem_tile_coord(Coord {
            x: 4_500_000,
            y: 3_200_000,
        })
        .unwrap();
        assert_eq!(tile_coord, TileCoord { col: 40, row: 30 });
        assert_eq!(eu_dem_tile_filename(tile_coord), "eu_dem_v11_E40N30.TIF");
    }

    #[test]
    fn file_boundaries_are_inclusive_below() {
        let just_under = eu_dem_tile_coord(Coord {
            x: 999_999,
            y: 999_999,
        })
        .unwrap();
        assert_eq!(just_under, TileCoord { col: 0, row: 0 });

        let on_boundary = eu_dem_tile_coord(Coord {
            x: 1_000_000,
            y: 1_000_000,
        })
        .unwrap();
        assert_eq!(on_boundary, TileCoord { col: 10, row: 10 });
    }

    #[test]
    fn negative_coordinates_are_uncovered() {
        assert!(eu_dem_tile_coord(Coord { x: -1, y: 100 }).is_none());
        assert!(eu_dem_tile_coord(Coord { x: 100, y: -1 }).is_none());
    }

    #[test]
    fn filenames_zero_pad_small_tile_coords() {
        assert_eq!(
            eu_dem_tile_filename(TileCoord { col: 0, row: 0 }),
            "eu_dem_v11_E00N00.TIF"
        );
    }
}

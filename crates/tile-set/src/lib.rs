//! Routing of elevation queries across a directory of GeoTIFF tiles.
//!
//! A [`TileSet`] maps native coordinates to per-file tile coordinates,
//! keeps a bounded cache of open decoders with files that do not exist
//! remembered as permanently absent, and fans batch queries out to the
//! decoders that cover them. On top of that sit bilinear interpolation,
//! the EU-DEM v1.1 dataset profile, and the elevation service facade that
//! accepts WGS 84 coordinates.

pub mod elevation;
pub mod eudem;
pub mod interpolate;
pub mod router;

pub use elevation::ElevationService;
pub use eudem::{eu_dem_elevation_service, eu_dem_tile_set, EU_DEM_SCALE, EU_DEM_SRID};
pub use interpolate::interpolate_bilinear;
pub use router::{TileSet, TileSetBuilder};

//! Single-file GeoTIFF decoding for tiled elevation rasters.
//!
//! This crate reads one narrow GeoTIFF profile: single-band tiled LZW
//! float32 with an axis-aligned integer pixel grid and the GDAL no-data
//! sentinel. Anything else is rejected at open time. Decoded tiles are held
//! in a bounded per-file cache; all-nodata tiles are recognized by a learned
//! compressed-byte signature and never occupy decoded memory.

pub mod geokeys;
pub mod tile;

mod tiff;

pub use geokeys::{parse_geo_keys, GeoKey, ParsedGeoKeys};
pub use tile::{no_data, DecoderStats, GeoTiffTile, TileOptions, GDAL_NO_DATA_TEXT, NO_DATA_BITS};

//! Shared test utilities for the dem-tiles workspace.
//!
//! The main tool here is [`GeoTiffBuilder`], which writes small synthetic
//! tiled-LZW GeoTIFF files matching the profile the decoder accepts, with
//! knobs for producing deliberately invalid files.

pub mod geotiff_builder;
pub mod grids;

pub use geotiff_builder::GeoTiffBuilder;
pub use grids::{gradient_grid, set_region_no_data, Lcg, NO_DATA};

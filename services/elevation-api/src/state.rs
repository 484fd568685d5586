//! Application state.

use std::sync::Arc;

use anyhow::Result;

use dem_common::{DirFs, TileFs};
use geotiff_parser::TileOptions;
use tile_set::{eu_dem_elevation_service, eu_dem_tile_set, ElevationService};

use crate::config::ElevationConfig;

/// Shared application state.
pub struct AppState {
    pub service: ElevationService,
}

impl AppState {
    pub fn new(config: &ElevationConfig) -> Result<Self> {
        let fs: Arc<dyn TileFs> = Arc::new(DirFs::new(&config.dem_path));

        let mut builder = eu_dem_tile_set(fs)
            .with_cache_size(config.decoder_cache_size)
            .with_tile_options(TileOptions {
                tile_cache_bytes: config.tile_cache_mb << 20,
            });
        if let Some(canary) = &config.canary {
            builder = builder.with_canary(canary.clone());
        }
        let tile_set = builder.build()?;

        Ok(Self {
            service: eu_dem_elevation_service(tile_set),
        })
    }
}

//! The tile-set router: one decoder per backing file, opened on demand.
//!
//! Files are addressed by a dataset-specific tile coordinate derived from
//! the query coordinate. Open decoders live in a bounded LRU; a file that
//! turns out not to exist is remembered as absent and never probed again,
//! since a tile set on disk is immutable for the lifetime of the process.
//! An evicted decoder's file handle closes when the last in-flight query
//! holding it finishes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;

use dem_common::{Coord, DemError, DemResult, Raster, TileCoord, TileFs};
use geotiff_parser::{GeoTiffTile, TileOptions};
use raster_cache::{CacheStats, Loaded, LoadingCache};

const DEFAULT_DECODER_CACHE_SIZE: usize = 32;

type TileCoordFn = Arc<dyn Fn(Coord) -> Option<TileCoord> + Send + Sync>;
type TileFilenameFn = Arc<dyn Fn(TileCoord) -> String + Send + Sync>;

/// Configures and validates a [`TileSet`].
pub struct TileSetBuilder {
    fs: Arc<dyn TileFs>,
    srid: u32,
    scale: (i64, i64),
    tile_coord_fn: TileCoordFn,
    tile_filename_fn: TileFilenameFn,
    cache_size: usize,
    tile_options: TileOptions,
    canary: Option<String>,
}

impl TileSetBuilder {
    /// `tile_coord_fn` maps a native coordinate to the tile coordinate of
    /// the file covering it, or `None` when the coordinate is outside the
    /// dataset's coverage; `tile_filename_fn` names that file.
    pub fn new<C, F>(
        fs: Arc<dyn TileFs>,
        srid: u32,
        scale: (i64, i64),
        tile_coord_fn: C,
        tile_filename_fn: F,
    ) -> Self
    where
        C: Fn(Coord) -> Option<TileCoord> + Send + Sync + 'static,
        F: Fn(TileCoord) -> String + Send + Sync + 'static,
    {
        Self {
            fs,
            srid,
            scale,
            tile_coord_fn: Arc::new(tile_coord_fn),
            tile_filename_fn: Arc::new(tile_filename_fn),
            cache_size: DEFAULT_DECODER_CACHE_SIZE,
            tile_options: TileOptions::default(),
            canary: None,
        }
    }

    /// Maximum number of decoders held open at once.
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_tile_options(mut self, tile_options: TileOptions) -> Self {
        self.tile_options = tile_options;
        self
    }

    /// A file that must exist and decode at build time, so a misconfigured
    /// data directory fails at startup instead of answering every query
    /// with NaN.
    pub fn with_canary(mut self, filename: impl Into<String>) -> Self {
        self.canary = Some(filename.into());
        self
    }

    pub fn build(self) -> DemResult<TileSet> {
        if let Some(canary) = &self.canary {
            GeoTiffTile::open(self.fs.as_ref(), canary, &self.tile_options).map_err(|err| {
                DemError::Config(format!("canary file {canary} failed to open: {err}"))
            })?;
            tracing::info!(%canary, "canary file validated");
        }

        let cache_size = NonZeroUsize::new(self.cache_size)
            .ok_or_else(|| DemError::Config("decoder cache size must be nonzero".to_string()))?;
        let decoders = LoadingCache::with_eviction(cache_size, |tile_coord: &TileCoord, _| {
            tracing::debug!(%tile_coord, "closing evicted decoder");
        });

        Ok(TileSet {
            fs: self.fs,
            srid: self.srid,
            scale: self.scale,
            tile_coord_fn: self.tile_coord_fn,
            tile_filename_fn: self.tile_filename_fn,
            tile_options: self.tile_options,
            decoders,
        })
    }
}

/// A set of same-CRS GeoTIFF files queried as one raster.
pub struct TileSet {
    fs: Arc<dyn TileFs>,
    srid: u32,
    scale: (i64, i64),
    tile_coord_fn: TileCoordFn,
    tile_filename_fn: TileFilenameFn,
    tile_options: TileOptions,
    decoders: LoadingCache<TileCoord, GeoTiffTile>,
}

impl std::fmt::Debug for TileSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSet")
            .field("srid", &self.srid)
            .field("scale", &self.scale)
            .field("tile_options", &self.tile_options)
            .finish_non_exhaustive()
    }
}

impl TileSet {
    /// A single sample at a native coordinate. NaN outside coverage, for
    /// files that do not exist, and for no-data pixels.
    pub async fn sample(&self, coord: Coord) -> DemResult<f64> {
        let Some(tile_coord) = (self.tile_coord_fn)(coord) else {
            return Ok(f64::NAN);
        };
        match self.decoder(tile_coord).await? {
            None => Ok(f64::NAN),
            Some(decoder) => decoder.sample(coord).await,
        }
    }

    /// Batch sampling across files. Coordinates are grouped per file so
    /// each decoder sees one batch; any decode error fails the whole batch.
    pub async fn samples(&self, coords: &[Coord]) -> DemResult<Vec<f64>> {
        let mut samples = vec![f64::NAN; coords.len()];

        let mut groups: HashMap<TileCoord, (Vec<usize>, Vec<Coord>)> = HashMap::new();
        for (index, &coord) in coords.iter().enumerate() {
            if let Some(tile_coord) = (self.tile_coord_fn)(coord) {
                let group = groups.entry(tile_coord).or_default();
                group.0.push(index);
                group.1.push(coord);
            }
        }

        for (tile_coord, (indexes, tile_coords)) in groups {
            let Some(decoder) = self.decoder(tile_coord).await? else {
                continue;
            };
            let tile_samples = decoder.samples(&tile_coords).await?;
            for (index, sample) in indexes.into_iter().zip(tile_samples) {
                samples[index] = sample;
            }
        }

        Ok(samples)
    }

    /// The dataset's spatial reference identifier.
    pub fn srid(&self) -> u32 {
        self.srid
    }

    /// Pixel size, (x, y).
    pub fn scale(&self) -> (i64, i64) {
        self.scale
    }

    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.decoders.stats()
    }

    /// Number of decoders currently open.
    pub async fn open_decoders(&self) -> usize {
        self.decoders.len().await
    }

    /// The decoder for a file-level tile coordinate, `None` when the
    /// backing file does not exist.
    async fn decoder(&self, tile_coord: TileCoord) -> DemResult<Option<Arc<GeoTiffTile>>> {
        self.decoders
            .get_or_load(tile_coord, || async move {
                let filename = (self.tile_filename_fn)(tile_coord);
                match GeoTiffTile::open(self.fs.as_ref(), &filename, &self.tile_options) {
                    Ok(decoder) => {
                        tracing::debug!(%filename, %tile_coord, "opened tile file");
                        Ok(Loaded::Value(decoder))
                    }
                    Err(err) if err.is_not_found() => {
                        tracing::debug!(%filename, %tile_coord, "no tile file, marking absent");
                        Ok(Loaded::Absent)
                    }
                    Err(err) => Err(err),
                }
            })
            .await
    }
}

#[async_trait]
impl Raster for TileSet {
    async fn samples(&self, coords: &[Coord]) -> DemResult<Vec<f64>> {
        TileSet::samples(self, coords).await
    }

    fn scale(&self) -> (i64, i64) {
        TileSet::scale(self)
    }
}

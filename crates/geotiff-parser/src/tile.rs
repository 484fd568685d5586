//! One open GeoTIFF elevation file.
//!
//! A `GeoTiffTile` validates the file against the supported profile at open
//! time, then decodes compressed tiles on demand into a bounded cache.
//! Tiles proven to be entirely no-data are remembered without payload, and
//! once one empty tile has been decoded its compressed bytes become a
//! signature that lets later empty tiles be recognized by byte equality,
//! skipping decompression. The heuristic assumes the smallest compressed
//! tile in the file is an empty one; the GDAL encoder emits byte-identical
//! output for uniform no-data tiles.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;

use dem_common::{Coord, DemError, DemResult, Raster, ReadAtFile, TileCoord, TileFs};
use raster_cache::{CacheStats, Loaded, LoadingCache};

use crate::geokeys::{parse_geo_keys, ParsedGeoKeys};
use crate::tiff::{
    parse_single_ifd, TAG_BITS_PER_SAMPLE, TAG_COMPRESSION, TAG_GDAL_NODATA,
    TAG_GEO_ASCII_PARAMS, TAG_GEO_DOUBLE_PARAMS, TAG_GEO_KEY_DIRECTORY, TAG_IMAGE_LENGTH,
    TAG_IMAGE_WIDTH, TAG_MODEL_PIXEL_SCALE, TAG_MODEL_TIEPOINT, TAG_PHOTOMETRIC_INTERPRETATION,
    TAG_PLANAR_CONFIGURATION, TAG_PREDICTOR, TAG_SAMPLES_PER_PIXEL, TAG_SAMPLE_FORMAT,
    TAG_TILE_BYTE_COUNTS, TAG_TILE_LENGTH, TAG_TILE_OFFSETS, TAG_TILE_WIDTH,
};

/// Bit pattern of the no-data sentinel (f32::MIN, GDAL's default for
/// float32 DEMs).
pub const NO_DATA_BITS: u32 = 0xff7f_ffff;

/// The GDALNoData tag text the supported profile requires.
pub const GDAL_NO_DATA_TEXT: &str = "-3.4028234663852886e+038";

/// The no-data sentinel value.
#[inline]
pub fn no_data() -> f32 {
    f32::from_bits(NO_DATA_BITS)
}

const LZW_COMPRESSION: u64 = 5;
const DEFAULT_TILE_CACHE_BYTES: usize = 128 << 20;

/// Decoder options.
#[derive(Debug, Clone)]
pub struct TileOptions {
    /// Budget for decoded samples held in memory per open file. The cache
    /// holds at least one tile regardless of the budget.
    pub tile_cache_bytes: usize,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            tile_cache_bytes: DEFAULT_TILE_CACHE_BYTES,
        }
    }
}

/// Decode counters, atomic for lock-free reads.
#[derive(Debug, Default)]
pub struct DecoderStats {
    /// Compressed tile ranges read from the file.
    pub tiles_read: AtomicU64,
    /// Tiles actually run through LZW.
    pub tiles_decompressed: AtomicU64,
    /// Empty tiles recognized by signature, without decompression.
    pub empty_by_signature: AtomicU64,
    /// 1 once the empty-tile signature has been learned.
    pub signatures_learned: AtomicU64,
}

/// An open, validated GeoTIFF elevation file.
pub struct GeoTiffTile {
    file: Arc<dyn ReadAtFile>,
    image_width: i64,
    image_length: i64,
    tile_width: i64,
    tile_length: i64,
    tiles_across: i64,
    tiles_down: i64,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
    smallest_tile_byte_count: u64,
    tile_sample_count: usize,
    uncompressed_tile_bytes: usize,
    scale_x: i64,
    scale_y: i64,
    translate_x: i64,
    translate_y: i64,
    geo_keys: Option<ParsedGeoKeys>,
    empty_tile_bytes: OnceLock<Bytes>,
    tile_cache: LoadingCache<TileCoord, Vec<f32>>,
    stats: Arc<DecoderStats>,
}

impl std::fmt::Debug for GeoTiffTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffTile")
            .field("image_width", &self.image_width)
            .field("image_length", &self.image_length)
            .field("tile_width", &self.tile_width)
            .field("tile_length", &self.tile_length)
            .finish_non_exhaustive()
    }
}

impl GeoTiffTile {
    /// Open and validate `filename`. Fails with `UnsupportedFormat` when
    /// the file does not match the supported profile, `MalformedFile` when
    /// its tile tables disagree with its dimensions, and `Io` (not-found
    /// distinguishable) when it cannot be read. No partial decoder state
    /// survives a failed open.
    pub fn open(fs: &dyn TileFs, filename: &str, options: &TileOptions) -> DemResult<Self> {
        let file = fs.open(filename)?;
        let ifd = parse_single_ifd(file.as_ref())?;

        let unsupported = |what: &str| DemError::UnsupportedFormat(format!("{filename}: {what}"));

        if ifd.scalar_u64(TAG_BITS_PER_SAMPLE)? != 32 {
            return Err(unsupported("bits per sample is not 32"));
        }
        if ifd.scalar_u64(TAG_COMPRESSION)? != LZW_COMPRESSION {
            return Err(unsupported("compression is not LZW"));
        }
        if ifd.scalar_u64(TAG_PHOTOMETRIC_INTERPRETATION)? != 1 {
            return Err(unsupported("photometric interpretation is not BlackIsZero"));
        }
        if ifd.scalar_u64(TAG_SAMPLES_PER_PIXEL)? != 1 {
            return Err(unsupported("more than one sample per pixel"));
        }
        if ifd.scalar_u64(TAG_PLANAR_CONFIGURATION)? != 1 {
            return Err(unsupported("planar configuration is not chunky"));
        }
        if ifd.scalar_u64(TAG_PREDICTOR)? != 1 {
            return Err(unsupported("predictor in use"));
        }
        if ifd.scalar_u64(TAG_SAMPLE_FORMAT)? != 3 {
            return Err(unsupported("sample format is not IEEE float"));
        }
        if ifd.ascii(TAG_GDAL_NODATA)? != GDAL_NO_DATA_TEXT {
            return Err(unsupported("unexpected no-data value"));
        }

        let pixel_scale = ifd.f64_values(TAG_MODEL_PIXEL_SCALE)?;
        let [scale_x, scale_y, scale_z] = pixel_scale.as_slice() else {
            return Err(unsupported("pixel scale is not three values"));
        };
        if *scale_z != 0.0 || scale_x.fract() != 0.0 || scale_y.fract() != 0.0 {
            return Err(unsupported("pixel scale is not integer and axis-aligned"));
        }
        if *scale_x < 1.0 || *scale_y < 1.0 {
            return Err(unsupported("pixel scale is not positive"));
        }

        let tiepoint = ifd.f64_values(TAG_MODEL_TIEPOINT)?;
        let [i, j, k, x, y, z] = tiepoint.as_slice() else {
            return Err(unsupported("tiepoint is not six values"));
        };
        if *i != 0.0 || *j != 0.0 || *k != 0.0 || *z != 0.0 {
            return Err(unsupported("tiepoint is not at the raster origin"));
        }
        if x.fract() != 0.0 || y.fract() != 0.0 {
            return Err(unsupported("origin is not integer"));
        }

        let image_width = ifd.scalar_u64(TAG_IMAGE_WIDTH)? as i64;
        let image_length = ifd.scalar_u64(TAG_IMAGE_LENGTH)? as i64;
        let tile_width = ifd.scalar_u64(TAG_TILE_WIDTH)? as i64;
        let tile_length = ifd.scalar_u64(TAG_TILE_LENGTH)? as i64;
        if image_width == 0 || image_length == 0 {
            return Err(DemError::MalformedFile(format!(
                "{filename}: zero image dimensions"
            )));
        }
        if tile_width == 0 || tile_length == 0 {
            return Err(unsupported("not tiled"));
        }

        // Dimension tags are untrusted LONG values; reject overflow.
        let tiles_across = (image_width + tile_width - 1) / tile_width;
        let tiles_down = (image_length + tile_length - 1) / tile_length;
        let tiles_per_image = tiles_across
            .checked_mul(tiles_down)
            .and_then(|tiles| usize::try_from(tiles).ok())
            .ok_or_else(|| {
                DemError::MalformedFile(format!(
                    "{filename}: implausible tile grid {tiles_across}x{tiles_down}"
                ))
            })?;

        let tile_offsets = ifd.integer_values(TAG_TILE_OFFSETS)?;
        let tile_byte_counts = ifd.integer_values(TAG_TILE_BYTE_COUNTS)?;
        if tile_offsets.len() != tiles_per_image || tile_byte_counts.len() != tiles_per_image {
            return Err(DemError::MalformedFile(format!(
                "{filename}: {} tile offsets and {} byte counts for {tiles_per_image} tiles",
                tile_offsets.len(),
                tile_byte_counts.len(),
            )));
        }
        let smallest_tile_byte_count = tile_byte_counts.iter().copied().min().unwrap_or(0);

        let (tile_sample_count, uncompressed_tile_bytes) = tile_width
            .checked_mul(tile_length)
            .and_then(|samples| usize::try_from(samples).ok())
            .and_then(|samples| Some((samples, samples.checked_mul(4)?)))
            .ok_or_else(|| {
                DemError::MalformedFile(format!(
                    "{filename}: implausible tile size {tile_width}x{tile_length}"
                ))
            })?;

        let geo_key_directory = ifd.u16_values(TAG_GEO_KEY_DIRECTORY)?;
        let geo_keys = if geo_key_directory.is_empty() {
            None
        } else {
            Some(parse_geo_keys(
                &geo_key_directory,
                &ifd.f64_values(TAG_GEO_DOUBLE_PARAMS)?,
                &ifd.ascii_bytes(TAG_GEO_ASCII_PARAMS)?,
            )?)
        };

        tracing::debug!(
            filename,
            image_width,
            image_length,
            tile_width,
            tile_length,
            "validated GeoTIFF"
        );

        let cache_entries = (options.tile_cache_bytes / uncompressed_tile_bytes).max(1);
        let tile_cache = LoadingCache::new(
            NonZeroUsize::new(cache_entries)
                .ok_or_else(|| DemError::Config("zero tile cache capacity".to_string()))?,
        );

        Ok(Self {
            file,
            image_width,
            image_length,
            tile_width,
            tile_length,
            tiles_across,
            tiles_down,
            tile_offsets,
            tile_byte_counts,
            smallest_tile_byte_count,
            tile_sample_count,
            uncompressed_tile_bytes,
            scale_x: *scale_x as i64,
            scale_y: *scale_y as i64,
            translate_x: *x as i64,
            translate_y: *y as i64,
            geo_keys,
            empty_tile_bytes: OnceLock::new(),
            tile_cache,
            stats: Arc::new(DecoderStats::default()),
        })
    }

    /// A single sample at a native coordinate. NaN outside the raster
    /// extent and for no-data pixels.
    pub async fn sample(&self, coord: Coord) -> DemResult<f64> {
        let local = self.local_coord(coord);
        let Some(local_tile_coord) = self.local_tile_coord(local) else {
            return Ok(f64::NAN);
        };
        match self.tile_samples(local_tile_coord).await? {
            None => Ok(f64::NAN),
            Some(tile_samples) => Ok(self.tile_sample(&tile_samples, local)),
        }
    }

    /// Batch sampling. Groups coordinates by tile so each tile is fetched
    /// from the cache once, then scatters results back into input order.
    /// Significantly faster than calling [`sample`](Self::sample) per
    /// coordinate for spatially clustered queries, with identical results.
    pub async fn samples(&self, coords: &[Coord]) -> DemResult<Vec<f64>> {
        let local_coords: Vec<Coord> = coords.iter().map(|&coord| self.local_coord(coord)).collect();

        let mut samples = vec![0.0; local_coords.len()];

        let mut indexes_by_tile: std::collections::HashMap<TileCoord, Vec<usize>> =
            std::collections::HashMap::new();
        for (index, &local) in local_coords.iter().enumerate() {
            match self.local_tile_coord(local) {
                None => samples[index] = f64::NAN,
                Some(local_tile_coord) => {
                    indexes_by_tile.entry(local_tile_coord).or_default().push(index);
                }
            }
        }

        for (local_tile_coord, indexes) in indexes_by_tile {
            match self.tile_samples(local_tile_coord).await? {
                None => {
                    for index in indexes {
                        samples[index] = f64::NAN;
                    }
                }
                Some(tile_samples) => {
                    for index in indexes {
                        samples[index] = self.tile_sample(&tile_samples, local_coords[index]);
                    }
                }
            }
        }

        Ok(samples)
    }

    /// Pixel size, (x, y).
    pub fn scale(&self) -> (i64, i64) {
        (self.scale_x, self.scale_y)
    }

    /// The parsed geo-key directory, when the file carries one.
    pub fn geo_keys(&self) -> Option<&ParsedGeoKeys> {
        self.geo_keys.as_ref()
    }

    /// Tile grid dimensions, (across, down).
    pub fn tile_grid(&self) -> (i64, i64) {
        (self.tiles_across, self.tiles_down)
    }

    pub fn decoder_stats(&self) -> Arc<DecoderStats> {
        Arc::clone(&self.stats)
    }

    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.tile_cache.stats()
    }

    /// Number of decoded tiles currently held.
    pub async fn cached_tiles(&self) -> usize {
        self.tile_cache.len().await
    }

    /// The decoded samples for a tile, `None` when the tile is empty.
    async fn tile_samples(&self, local_tile_coord: TileCoord) -> DemResult<Option<Arc<Vec<f32>>>> {
        self.tile_cache
            .get_or_load(local_tile_coord, || async move {
                self.load_tile(local_tile_coord)
            })
            .await
    }

    fn load_tile(&self, local_tile_coord: TileCoord) -> DemResult<Loaded<Vec<f32>>> {
        let compressed = self.read_compressed_tile(local_tile_coord)?;

        if let Some(signature) = self.empty_tile_bytes.get() {
            if *signature == compressed {
                self.stats.empty_by_signature.fetch_add(1, Ordering::Relaxed);
                return Ok(Loaded::Absent);
            }
        }

        let tile_data = self.decompress_tile(&compressed)?;
        let tile_samples = decode_tile_data(&tile_data, self.tile_sample_count);

        // If we do not yet know what an empty tile looks like compressed and
        // this is the smallest tile in the file, check whether it is empty
        // and, if so, keep its bytes to recognize empty tiles before
        // decompression from now on.
        if self.empty_tile_bytes.get().is_none()
            && compressed.len() as u64 == self.smallest_tile_byte_count
            && tile_samples.iter().all(|&sample| sample == no_data())
        {
            if self.empty_tile_bytes.set(compressed).is_ok() {
                self.stats.signatures_learned.fetch_add(1, Ordering::Relaxed);
            }
            return Ok(Loaded::Absent);
        }

        Ok(Loaded::Value(tile_samples))
    }

    fn read_compressed_tile(&self, local_tile_coord: TileCoord) -> DemResult<Bytes> {
        let tile_index = (local_tile_coord.col + self.tiles_across * local_tile_coord.row) as usize;
        let tile_byte_count = self.tile_byte_counts[tile_index];
        let tile_offset = self.tile_offsets[tile_index];

        let mut compressed = vec![0u8; tile_byte_count as usize];
        let read = self.file.read_full_at(&mut compressed, tile_offset)?;
        self.stats.tiles_read.fetch_add(1, Ordering::Relaxed);
        if (read as u64) < tile_byte_count {
            return Err(DemError::ShortRead {
                tile: local_tile_coord,
                expected: tile_byte_count,
                actual: read as u64,
            });
        }
        Ok(Bytes::from(compressed))
    }

    fn decompress_tile(&self, compressed: &[u8]) -> DemResult<Vec<u8>> {
        let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
        let mut tile_data = decoder
            .decode(compressed)
            .map_err(|err| DemError::Decompress(err.to_string()))?;
        self.stats.tiles_decompressed.fetch_add(1, Ordering::Relaxed);
        if tile_data.len() < self.uncompressed_tile_bytes {
            return Err(DemError::Decompress(format!(
                "tile decompressed to {} bytes, expected {}",
                tile_data.len(),
                self.uncompressed_tile_bytes
            )));
        }
        tile_data.truncate(self.uncompressed_tile_bytes);
        Ok(tile_data)
    }

    /// The local pixel coordinate of a native coordinate, via the inverse
    /// affine mapping with truncating integer division.
    fn local_coord(&self, coord: Coord) -> Coord {
        Coord {
            x: (coord.x - self.translate_x) / self.scale_x,
            y: -(coord.y - self.translate_y) / self.scale_y,
        }
    }

    /// The in-file tile holding a local pixel coordinate, `None` outside
    /// the image.
    fn local_tile_coord(&self, local_coord: Coord) -> Option<TileCoord> {
        if local_coord.x < 0
            || self.image_width <= local_coord.x
            || local_coord.y < 0
            || self.image_length <= local_coord.y
        {
            return None;
        }
        Some(TileCoord {
            col: local_coord.x / self.tile_width,
            row: local_coord.y / self.tile_length,
        })
    }

    fn tile_sample(&self, tile_samples: &[f32], local_coord: Coord) -> f64 {
        let index = (local_coord.x % self.tile_width
            + (local_coord.y % self.tile_length) * self.tile_width) as usize;
        let sample = tile_samples[index];
        if sample == no_data() {
            f64::NAN
        } else {
            f64::from(sample)
        }
    }
}

#[async_trait]
impl Raster for GeoTiffTile {
    async fn samples(&self, coords: &[Coord]) -> DemResult<Vec<f64>> {
        GeoTiffTile::samples(self, coords).await
    }

    fn scale(&self) -> (i64, i64) {
        GeoTiffTile::scale(self)
    }
}

fn decode_tile_data(tile_data: &[u8], sample_count: usize) -> Vec<f32> {
    tile_data[..sample_count * 4]
        .chunks_exact(4)
        .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .collect()
}

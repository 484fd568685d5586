//! Synthetic tiled-LZW GeoTIFF writer.
//!
//! Produces little-endian classic TIFF files matching the profile the
//! decoder accepts: one IFD, single band, float32 samples, LZW-compressed
//! tiles, integer pixel scale and origin, GDAL no-data text. Builder knobs
//! deliberately break individual properties for format-rejection tests.

use std::io;
use std::path::Path;

use crate::grids::NO_DATA;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;

const GDAL_NO_DATA_TEXT: &str = "-3.4028234663852886e+038";

/// Builds one synthetic GeoTIFF file.
pub struct GeoTiffBuilder {
    image_width: usize,
    image_length: usize,
    tile_width: usize,
    tile_length: usize,
    scale: (i64, i64),
    origin: (i64, i64),
    samples: Vec<f32>,
    bits_per_sample: u16,
    gdal_no_data: String,
    geo_key_directory: Option<Vec<u16>>,
    tile_table_len_delta: isize,
    truncate_tail: usize,
}

impl GeoTiffBuilder {
    /// A builder for an all-no-data raster with scale (25, 25) and its
    /// origin at the north-west corner of a grid anchored at (0, 0).
    pub fn new(
        image_width: usize,
        image_length: usize,
        tile_width: usize,
        tile_length: usize,
    ) -> Self {
        Self {
            image_width,
            image_length,
            tile_width,
            tile_length,
            scale: (25, 25),
            origin: (0, 25 * image_length as i64),
            samples: vec![NO_DATA; image_width * image_length],
            bits_per_sample: 32,
            gdal_no_data: GDAL_NO_DATA_TEXT.to_string(),
            geo_key_directory: None,
            tile_table_len_delta: 0,
            truncate_tail: 0,
        }
    }

    /// Row-major samples covering the whole image.
    pub fn with_samples(mut self, samples: Vec<f32>) -> Self {
        assert_eq!(samples.len(), self.image_width * self.image_length);
        self.samples = samples;
        self
    }

    pub fn with_scale(mut self, scale_x: i64, scale_y: i64) -> Self {
        self.scale = (scale_x, scale_y);
        self
    }

    /// Native coordinates of the raster's north-west corner.
    pub fn with_origin(mut self, x: i64, y: i64) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn with_bits_per_sample(mut self, bits_per_sample: u16) -> Self {
        self.bits_per_sample = bits_per_sample;
        self
    }

    pub fn with_gdal_no_data(mut self, text: &str) -> Self {
        self.gdal_no_data = text.to_string();
        self
    }

    pub fn with_geo_key_directory(mut self, directory: Vec<u16>) -> Self {
        self.geo_key_directory = Some(directory);
        self
    }

    /// Grow (positive) or shrink (negative) the tile offset and byte-count
    /// tables relative to the tile grid, producing a malformed file.
    pub fn with_tile_table_len_delta(mut self, delta: isize) -> Self {
        self.tile_table_len_delta = delta;
        self
    }

    /// Drop the last `bytes` bytes of the file, so reading the final tile
    /// comes up short.
    pub fn with_truncated_tail(mut self, bytes: usize) -> Self {
        self.truncate_tail = bytes;
        self
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    /// Serialize the file to bytes.
    pub fn build(&self) -> Vec<u8> {
        let tiles = self.compress_tiles();

        let mut tile_byte_counts: Vec<u32> = tiles.iter().map(|tile| tile.len() as u32).collect();
        resize_table(&mut tile_byte_counts, self.tile_table_len_delta);

        let mut entries = vec![
            Entry::short(256, self.image_width as u16),
            Entry::short(257, self.image_length as u16),
            Entry::short(258, self.bits_per_sample),
            Entry::short(259, 5),
            Entry::short(262, 1),
            Entry::short(277, 1),
            Entry::short(284, 1),
            Entry::short(317, 1),
            Entry::short(322, self.tile_width as u16),
            Entry::short(323, self.tile_length as u16),
            Entry::longs(324, &vec![0; tile_byte_counts.len()]),
            Entry::longs(325, &tile_byte_counts),
            Entry::short(339, 3),
            Entry::doubles(33550, &[self.scale.0 as f64, self.scale.1 as f64, 0.0]),
            Entry::doubles(
                33922,
                &[0.0, 0.0, 0.0, self.origin.0 as f64, self.origin.1 as f64, 0.0],
            ),
            Entry::ascii(42113, &self.gdal_no_data),
        ];
        if let Some(directory) = &self.geo_key_directory {
            entries.push(Entry::shorts(34735, directory));
        }
        entries.sort_by_key(|entry| entry.tag);

        // Lay out: header, IFD, out-of-line values, tile data.
        let ifd_offset = 8usize;
        let data_start = ifd_offset + 2 + 12 * entries.len() + 4;
        let mut cursor = data_start;
        let mut value_offsets = vec![0usize; entries.len()];
        for (index, entry) in entries.iter().enumerate() {
            if entry.value.len() > 4 {
                value_offsets[index] = cursor;
                cursor += pad2(entry.value.len());
            }
        }
        let mut tile_offsets = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            tile_offsets.push(cursor as u32);
            cursor += tile.len();
        }
        let file_len = cursor;

        resize_table(&mut tile_offsets, self.tile_table_len_delta);
        let offsets_index = entries.iter().position(|entry| entry.tag == 324).unwrap();
        entries[offsets_index].value = long_bytes(&tile_offsets);

        let mut out = vec![0u8; file_len];
        out[0..2].copy_from_slice(b"II");
        out[2..4].copy_from_slice(&42u16.to_le_bytes());
        out[4..8].copy_from_slice(&(ifd_offset as u32).to_le_bytes());

        out[ifd_offset..ifd_offset + 2].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        for (index, entry) in entries.iter().enumerate() {
            let at = ifd_offset + 2 + 12 * index;
            out[at..at + 2].copy_from_slice(&entry.tag.to_le_bytes());
            out[at + 2..at + 4].copy_from_slice(&entry.field_type.to_le_bytes());
            out[at + 4..at + 8].copy_from_slice(&entry.count.to_le_bytes());
            if entry.value.len() <= 4 {
                out[at + 8..at + 8 + entry.value.len()].copy_from_slice(&entry.value);
            } else {
                let offset = value_offsets[index];
                out[at + 8..at + 12].copy_from_slice(&(offset as u32).to_le_bytes());
                out[offset..offset + entry.value.len()].copy_from_slice(&entry.value);
            }
        }
        // Next-IFD offset stays zero: exactly one IFD.

        for (tile, offset) in tiles.iter().zip(&tile_offsets) {
            let offset = *offset as usize;
            out[offset..offset + tile.len()].copy_from_slice(tile);
        }

        out.truncate(file_len - self.truncate_tail);
        out
    }

    fn compress_tiles(&self) -> Vec<Vec<u8>> {
        let tiles_across = self.image_width.div_ceil(self.tile_width);
        let tiles_down = self.image_length.div_ceil(self.tile_length);

        let mut tiles = Vec::with_capacity(tiles_across * tiles_down);
        for tile_row in 0..tiles_down {
            for tile_col in 0..tiles_across {
                let mut raw = Vec::with_capacity(self.tile_width * self.tile_length * 4);
                for pixel_row in 0..self.tile_length {
                    for pixel_col in 0..self.tile_width {
                        let x = tile_col * self.tile_width + pixel_col;
                        let y = tile_row * self.tile_length + pixel_row;
                        let sample = if x < self.image_width && y < self.image_length {
                            self.samples[y * self.image_width + x]
                        } else {
                            NO_DATA
                        };
                        raw.extend_from_slice(&sample.to_le_bytes());
                    }
                }
                let compressed =
                    weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                        .encode(&raw)
                        .expect("LZW encoding failed");
                tiles.push(compressed);
            }
        }
        tiles
    }
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: Vec<u8>,
}

impl Entry {
    fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, &[value])
    }

    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            value: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: TYPE_LONG,
            count: values.len() as u32,
            value: long_bytes(values),
        }
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        Self {
            tag,
            field_type: TYPE_DOUBLE,
            count: values.len() as u32,
            value: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut value = text.as_bytes().to_vec();
        value.push(0);
        Self {
            tag,
            field_type: TYPE_ASCII,
            count: value.len() as u32,
            value,
        }
    }
}

fn long_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn resize_table(table: &mut Vec<u32>, delta: isize) {
    let len = table.len().saturating_add_signed(delta);
    table.resize(len, 0);
}

fn pad2(len: usize) -> usize {
    len + len % 2
}

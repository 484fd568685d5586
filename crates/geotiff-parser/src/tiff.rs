//! Minimal TIFF container reading: header, one image file directory, and
//! typed tag access with values loaded eagerly.
//!
//! Only classic TIFF is supported (BigTIFF is rejected). Both byte orders
//! are accepted for the container; sample data is always little-endian and
//! is decoded elsewhere.

use std::collections::BTreeMap;

use dem_common::{DemError, DemResult, ReadAtFile};

pub(crate) const TAG_IMAGE_WIDTH: u16 = 256;
pub(crate) const TAG_IMAGE_LENGTH: u16 = 257;
pub(crate) const TAG_BITS_PER_SAMPLE: u16 = 258;
pub(crate) const TAG_COMPRESSION: u16 = 259;
pub(crate) const TAG_PHOTOMETRIC_INTERPRETATION: u16 = 262;
pub(crate) const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub(crate) const TAG_PLANAR_CONFIGURATION: u16 = 284;
pub(crate) const TAG_PREDICTOR: u16 = 317;
pub(crate) const TAG_TILE_WIDTH: u16 = 322;
pub(crate) const TAG_TILE_LENGTH: u16 = 323;
pub(crate) const TAG_TILE_OFFSETS: u16 = 324;
pub(crate) const TAG_TILE_BYTE_COUNTS: u16 = 325;
pub(crate) const TAG_SAMPLE_FORMAT: u16 = 339;
pub(crate) const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const TAG_MODEL_TIEPOINT: u16 = 33922;
pub(crate) const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const TAG_GEO_DOUBLE_PARAMS: u16 = 34736;
pub(crate) const TAG_GEO_ASCII_PARAMS: u16 = 34737;
pub(crate) const TAG_GDAL_NODATA: u16 = 42113;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;

/// One image file directory with all tag values in memory.
pub(crate) struct Ifd {
    little_endian: bool,
    entries: BTreeMap<u16, Entry>,
}

struct Entry {
    field_type: u16,
    count: u64,
    data: Vec<u8>,
}

/// Byte size of one value of a TIFF field type, or None for types we do not
/// carry (entries with unknown types are skipped, not rejected; required
/// tags are validated by their accessors).
fn type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// Parse the TIFF header and the single IFD the supported profile allows.
pub(crate) fn parse_single_ifd(file: &dyn ReadAtFile) -> DemResult<Ifd> {
    let mut header = [0u8; 8];
    if file.read_full_at(&mut header, 0)? != header.len() {
        return Err(DemError::MalformedFile("truncated TIFF header".to_string()));
    }

    let little_endian = match &header[0..2] {
        b"II" => true,
        b"MM" => false,
        _ => return Err(DemError::MalformedFile("bad TIFF signature".to_string())),
    };
    match read_u16(&header[2..4], little_endian) {
        42 => {}
        43 => return Err(DemError::UnsupportedFormat("BigTIFF".to_string())),
        version => {
            return Err(DemError::MalformedFile(format!(
                "bad TIFF version {version}"
            )))
        }
    }
    let ifd_offset = u64::from(read_u32(&header[4..8], little_endian));

    let mut count_buf = [0u8; 2];
    if file.read_full_at(&mut count_buf, ifd_offset)? != count_buf.len() {
        return Err(DemError::MalformedFile("truncated IFD".to_string()));
    }
    let entry_count = read_u16(&count_buf, little_endian) as usize;

    let mut entry_buf = vec![0u8; 12 * entry_count + 4];
    if file.read_full_at(&mut entry_buf, ifd_offset + 2)? != entry_buf.len() {
        return Err(DemError::MalformedFile("truncated IFD".to_string()));
    }

    let next_ifd_offset = read_u32(&entry_buf[12 * entry_count..], little_endian);
    if next_ifd_offset != 0 {
        return Err(DemError::UnsupportedFormat(
            "more than one image file directory".to_string(),
        ));
    }

    let mut entries = BTreeMap::new();
    for raw in entry_buf[..12 * entry_count].chunks_exact(12) {
        let tag = read_u16(&raw[0..2], little_endian);
        let field_type = read_u16(&raw[2..4], little_endian);
        let count = u64::from(read_u32(&raw[4..8], little_endian));

        let Some(size) = type_size(field_type) else {
            continue;
        };
        let byte_len = size
            .checked_mul(count as usize)
            .ok_or_else(|| DemError::MalformedFile(format!("tag {tag} value overflow")))?;

        let data = if byte_len <= 4 {
            raw[8..8 + byte_len].to_vec()
        } else {
            let offset = u64::from(read_u32(&raw[8..12], little_endian));
            let mut data = vec![0u8; byte_len];
            if file.read_full_at(&mut data, offset)? != byte_len {
                return Err(DemError::MalformedFile(format!(
                    "truncated value for tag {tag}"
                )));
            }
            data
        };

        entries.insert(
            tag,
            Entry {
                field_type,
                count,
                data,
            },
        );
    }

    Ok(Ifd {
        little_endian,
        entries,
    })
}

impl Ifd {
    /// A single SHORT or LONG value; 0 when the tag is absent, so profile
    /// validation rejects missing required tags by value.
    pub(crate) fn scalar_u64(&self, tag: u16) -> DemResult<u64> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(0);
        };
        if entry.count != 1 {
            return Err(DemError::UnsupportedFormat(format!(
                "tag {tag} has {} values, expected 1",
                entry.count
            )));
        }
        Ok(self.integer_values(tag)?[0])
    }

    /// All values of a SHORT or LONG array tag; empty when absent.
    pub(crate) fn integer_values(&self, tag: u16) -> DemResult<Vec<u64>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(Vec::new());
        };
        match entry.field_type {
            TYPE_SHORT => Ok(entry
                .data
                .chunks_exact(2)
                .map(|raw| u64::from(read_u16(raw, self.little_endian)))
                .collect()),
            TYPE_LONG => Ok(entry
                .data
                .chunks_exact(4)
                .map(|raw| u64::from(read_u32(raw, self.little_endian)))
                .collect()),
            other => Err(DemError::UnsupportedFormat(format!(
                "tag {tag} has type {other}, expected SHORT or LONG"
            ))),
        }
    }

    /// All values of a SHORT array tag; empty when absent.
    pub(crate) fn u16_values(&self, tag: u16) -> DemResult<Vec<u16>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(Vec::new());
        };
        if entry.field_type != TYPE_SHORT {
            return Err(DemError::UnsupportedFormat(format!(
                "tag {tag} has type {}, expected SHORT",
                entry.field_type
            )));
        }
        Ok(entry
            .data
            .chunks_exact(2)
            .map(|raw| read_u16(raw, self.little_endian))
            .collect())
    }

    /// All values of a DOUBLE array tag; empty when absent.
    pub(crate) fn f64_values(&self, tag: u16) -> DemResult<Vec<f64>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(Vec::new());
        };
        if entry.field_type != TYPE_DOUBLE {
            return Err(DemError::UnsupportedFormat(format!(
                "tag {tag} has type {}, expected DOUBLE",
                entry.field_type
            )));
        }
        Ok(entry
            .data
            .chunks_exact(8)
            .map(|raw| read_f64(raw, self.little_endian))
            .collect())
    }

    /// An ASCII tag without its NUL terminator; empty when absent.
    pub(crate) fn ascii(&self, tag: u16) -> DemResult<String> {
        let bytes = self.ascii_bytes(tag)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Raw bytes of an ASCII tag; empty when absent. Geo-key parsing indexes
    /// into this buffer, so NUL terminators are preserved.
    pub(crate) fn ascii_bytes(&self, tag: u16) -> DemResult<Vec<u8>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(Vec::new());
        };
        if entry.field_type != TYPE_ASCII {
            return Err(DemError::UnsupportedFormat(format!(
                "tag {tag} has type {}, expected ASCII",
                entry.field_type
            )));
        }
        Ok(entry.data.clone())
    }
}

fn read_u16(raw: &[u8], little_endian: bool) -> u16 {
    let bytes = [raw[0], raw[1]];
    if little_endian {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    }
}

fn read_u32(raw: &[u8], little_endian: bool) -> u32 {
    let bytes = [raw[0], raw[1], raw[2], raw[3]];
    if little_endian {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    }
}

fn read_f64(raw: &[u8], little_endian: bool) -> f64 {
    let bytes = [
        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
    ];
    if little_endian {
        f64::from_le_bytes(bytes)
    } else {
        f64::from_be_bytes(bytes)
    }
}

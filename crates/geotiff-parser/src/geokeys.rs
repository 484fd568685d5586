//! GeoTIFF geo-key directory parsing.
//!
//! The geo-key directory describes the raster's coordinate reference
//! system. It is parsed when present so callers can inspect the CRS, but it
//! is not required for sampling.

use std::collections::HashMap;

use dem_common::{DemError, DemResult};

/// A geo-key identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeoKey(pub u16);

impl GeoKey {
    pub const GT_MODEL_TYPE: GeoKey = GeoKey(1024);
    pub const GT_RASTER_TYPE: GeoKey = GeoKey(1025);
    pub const GT_CITATION: GeoKey = GeoKey(1026);

    pub const GEODETIC_CRS: GeoKey = GeoKey(2048);
    pub const GEOG_CITATION: GeoKey = GeoKey(2049);
    pub const GEODETIC_DATUM: GeoKey = GeoKey(2050);
    pub const PRIME_MERIDIAN: GeoKey = GeoKey(2051);
    pub const LINEAR_UNITS: GeoKey = GeoKey(2052);
    pub const GEOG_LINEAR_UNIT_SIZE: GeoKey = GeoKey(2053);
    pub const ANGULAR_UNITS: GeoKey = GeoKey(2054);
    pub const GEOG_ANGULAR_UNIT_SIZE: GeoKey = GeoKey(2055);
    pub const ELLIPSOID: GeoKey = GeoKey(2056);
    pub const ELLIPSOID_SEMI_MAJOR_AXIS: GeoKey = GeoKey(2057);
    pub const ELLIPSOID_SEMI_MINOR_AXIS: GeoKey = GeoKey(2058);
    pub const ELLIPSOID_INV_FLATTENING: GeoKey = GeoKey(2059);
    pub const AZIMUTH_UNITS: GeoKey = GeoKey(2060);
    pub const PRIME_MERIDIAN_LONGITUDE: GeoKey = GeoKey(2061);

    pub const PROJECTED_CRS: GeoKey = GeoKey(3072);
    pub const PCS_CITATION: GeoKey = GeoKey(3073);
    pub const PROJECTION: GeoKey = GeoKey(3074);
    pub const PROJ_METHOD: GeoKey = GeoKey(3075);
    pub const PROJ_LINEAR_UNITS: GeoKey = GeoKey(3076);
    pub const PROJ_LINEAR_UNIT_SIZE: GeoKey = GeoKey(3077);
    pub const STANDARD_PARALLEL_1: GeoKey = GeoKey(3078);
    pub const STANDARD_PARALLEL_2: GeoKey = GeoKey(3079);
    pub const NATURAL_ORIGIN_LONGITUDE: GeoKey = GeoKey(3080);
    pub const NATURAL_ORIGIN_LATITUDE: GeoKey = GeoKey(3081);
    pub const FALSE_EASTING: GeoKey = GeoKey(3082);
    pub const FALSE_NORTHING: GeoKey = GeoKey(3083);
    pub const FALSE_ORIGIN_LONGITUDE: GeoKey = GeoKey(3084);
    pub const FALSE_ORIGIN_LATITUDE: GeoKey = GeoKey(3085);
    pub const FALSE_ORIGIN_EASTING: GeoKey = GeoKey(3086);
    pub const FALSE_ORIGIN_NORTHING: GeoKey = GeoKey(3087);
    pub const CENTER_LONGITUDE: GeoKey = GeoKey(3088);
    pub const CENTER_LATITUDE: GeoKey = GeoKey(3089);
    pub const CENTER_EASTING: GeoKey = GeoKey(3090);
    pub const CENTER_NORTHING: GeoKey = GeoKey(3091);
    pub const SCALE_AT_NATURAL_ORIGIN: GeoKey = GeoKey(3092);
    pub const SCALE_AT_CENTER: GeoKey = GeoKey(3093);
    pub const PROJ_AZIMUTH_ANGLE: GeoKey = GeoKey(3094);
    pub const STRAIGHT_VERTICAL_POLE: GeoKey = GeoKey(3095);

    pub const VERTICAL: GeoKey = GeoKey(4096);
    pub const VERTICAL_CITATION: GeoKey = GeoKey(4097);
    pub const VERTICAL_DATUM: GeoKey = GeoKey(4098);
    pub const VERTICAL_UNITS: GeoKey = GeoKey(4099);
}

/// The decoded geo-key directory.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedGeoKeys {
    pub params: HashMap<GeoKey, u16>,
    pub double_params: HashMap<GeoKey, f64>,
    pub ascii_params: HashMap<GeoKey, String>,
}

impl ParsedGeoKeys {
    /// The projected CRS code, when present.
    pub fn projected_crs(&self) -> Option<u16> {
        self.params.get(&GeoKey::PROJECTED_CRS).copied()
    }
}

const DOUBLE_PARAMS_LOCATION: u16 = 34736;
const ASCII_PARAMS_LOCATION: u16 = 34737;

/// Parse a geo-key directory together with its double and ASCII parameter
/// tags.
pub fn parse_geo_keys(
    directory: &[u16],
    double_params: &[f64],
    ascii_params: &[u8],
) -> DemResult<ParsedGeoKeys> {
    if directory.len() < 4 {
        return Err(DemError::GeoKeys("directory too short".to_string()));
    }
    if directory[0] != 1 {
        return Err(DemError::GeoKeys(format!(
            "unknown directory version {}",
            directory[0]
        )));
    }
    if directory[1] != 1 {
        return Err(DemError::GeoKeys(format!(
            "unknown key revision {}",
            directory[1]
        )));
    }
    if directory[2] != 0 && directory[2] != 1 {
        return Err(DemError::GeoKeys(format!(
            "unknown minor revision {}",
            directory[2]
        )));
    }
    let number_of_keys = directory[3] as usize;
    if directory.len() != 4 + 4 * number_of_keys {
        return Err(DemError::GeoKeys(format!(
            "directory length {} does not match {} keys",
            directory.len(),
            number_of_keys
        )));
    }

    let mut parsed = ParsedGeoKeys::default();
    for entry in directory[4..].chunks_exact(4) {
        let key = GeoKey(entry[0]);
        let location = entry[1];
        let count = entry[2] as usize;
        let value = entry[3];
        match location {
            0 => {
                if count != 1 {
                    return Err(DemError::GeoKeys(format!(
                        "inline key {} has count {count}",
                        key.0
                    )));
                }
                parsed.params.insert(key, value);
            }
            DOUBLE_PARAMS_LOCATION => {
                if count != 1 {
                    return Err(DemError::GeoKeys(format!(
                        "double key {} has count {count}",
                        key.0
                    )));
                }
                let double = double_params.get(value as usize).copied().ok_or_else(|| {
                    DemError::GeoKeys(format!("double key {} index out of range", key.0))
                })?;
                parsed.double_params.insert(key, double);
            }
            ASCII_PARAMS_LOCATION => {
                let start = value as usize;
                let end = start + count;
                let bytes = ascii_params.get(start..end).ok_or_else(|| {
                    DemError::GeoKeys(format!("ascii key {} range out of bounds", key.0))
                })?;
                parsed
                    .ascii_params
                    .insert(key, String::from_utf8_lossy(bytes).into_owned());
            }
            other => {
                return Err(DemError::GeoKeys(format!(
                    "unsupported tag location {other}"
                )));
            }
        }
    }
    Ok(parsed)
}

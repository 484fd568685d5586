//! Service configuration.

use std::path::PathBuf;

/// Settings for the elevation service, filled from CLI flags and
/// environment variables by the binary.
#[derive(Debug, Clone)]
pub struct ElevationConfig {
    /// Directory holding the EU-DEM v1.1 GeoTIFF files.
    pub dem_path: PathBuf,

    /// Maximum number of tile files held open at once.
    pub decoder_cache_size: usize,

    /// Decoded-sample cache budget per open file, in megabytes.
    pub tile_cache_mb: usize,

    /// A file that must exist and decode at startup, e.g.
    /// `eu_dem_v11_E40N30.TIF`. Catches a misconfigured data directory
    /// before the service starts answering NaN to everything.
    pub canary: Option<String>,
}

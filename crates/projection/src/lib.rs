//! Map projections for elevation queries.
//!
//! Query coordinates arrive as WGS 84 longitude/latitude but the rasters
//! live in a projected CRS, so the service needs exactly one forward
//! projection. It is implemented directly rather than through a proj
//! binding, which keeps the workspace free of native library dependencies.

pub mod laea;

pub use laea::{etrs89_laea, LambertAzimuthalEqualArea};

//! Lambert Azimuthal Equal Area projection on an ellipsoid.
//!
//! Forward projection only (geographic to projected), following EPSG
//! guidance note 7-2, method code 9820. The one instance the elevation
//! service needs is ETRS89-extended / LAEA Europe (EPSG:3035), with its
//! natural origin at 52°N 10°E on the GRS 1980 ellipsoid.

use std::f64::consts::FRAC_PI_2;

use dem_common::{DemError, DemResult};

/// Lambert Azimuthal Equal Area projection parameters, with the
/// latitude-independent terms precomputed.
#[derive(Debug, Clone)]
pub struct LambertAzimuthalEqualArea {
    /// Semi-major axis in meters.
    a: f64,
    /// First eccentricity.
    e: f64,
    /// First eccentricity squared.
    e_sq: f64,
    /// Longitude of natural origin in radians.
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
    /// q evaluated at the pole.
    q_p: f64,
    /// Radius of the authalic sphere scaled to the projection.
    r_q: f64,
    sin_beta0: f64,
    cos_beta0: f64,
    d: f64,
}

impl LambertAzimuthalEqualArea {
    /// Build a projection from ellipsoid and origin parameters, angles in
    /// degrees and lengths in meters.
    pub fn new(
        semi_major_axis: f64,
        inverse_flattening: f64,
        lat0_deg: f64,
        lon0_deg: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = 1.0 / inverse_flattening;
        let e_sq = f * (2.0 - f);
        let e = e_sq.sqrt();

        let lat0 = lat0_deg.to_radians();
        let q_p = authalic_q(FRAC_PI_2, e, e_sq);
        let q_0 = authalic_q(lat0, e, e_sq);
        let beta0 = (q_0 / q_p).asin();
        let r_q = semi_major_axis * (q_p / 2.0).sqrt();
        let d = semi_major_axis * lat0.cos()
            / ((1.0 - e_sq * lat0.sin().powi(2)).sqrt() * r_q * beta0.cos());

        Self {
            a: semi_major_axis,
            e,
            e_sq,
            lon0: lon0_deg.to_radians(),
            false_easting,
            false_northing,
            q_p,
            r_q,
            sin_beta0: beta0.sin(),
            cos_beta0: beta0.cos(),
            d,
        }
    }

    /// Project geographic coordinates in degrees to easting/northing in
    /// meters. Fails for coordinates outside the geographic domain and for
    /// the antipode of the origin, where the projection is undefined.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> DemResult<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat_deg) || !(-180.0..=180.0).contains(&lon_deg) {
            return Err(DemError::Projection(format!(
                "coordinate ({lon_deg}, {lat_deg}) outside geographic bounds"
            )));
        }

        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();

        let q = authalic_q(lat, self.e, self.e_sq);
        // Clamp against rounding at the poles, where q/q_p can exceed 1 by
        // a few ulps.
        let beta = (q / self.q_p).clamp(-1.0, 1.0).asin();
        let delta_lon = lon - self.lon0;

        let b_denominator =
            1.0 + self.sin_beta0 * beta.sin() + self.cos_beta0 * beta.cos() * delta_lon.cos();
        if b_denominator <= f64::EPSILON {
            return Err(DemError::Projection(format!(
                "coordinate ({lon_deg}, {lat_deg}) is antipodal to the projection origin"
            )));
        }
        let b = self.r_q * (2.0 / b_denominator).sqrt();

        let easting = self.false_easting + b * self.d * beta.cos() * delta_lon.sin();
        let northing = self.false_northing
            + (b / self.d)
                * (self.cos_beta0 * beta.sin() - self.sin_beta0 * beta.cos() * delta_lon.cos());
        Ok((easting, northing))
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.a
    }
}

/// The authalic latitude intermediate q(φ).
fn authalic_q(lat: f64, e: f64, e_sq: f64) -> f64 {
    let sin_lat = lat.sin();
    (1.0 - e_sq)
        * (sin_lat / (1.0 - e_sq * sin_lat * sin_lat)
            - (1.0 / (2.0 * e)) * ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).ln())
}

/// ETRS89-extended / LAEA Europe (EPSG:3035): GRS 1980 ellipsoid, natural
/// origin 52°N 10°E, false origin (4321000, 3210000).
pub fn etrs89_laea() -> LambertAzimuthalEqualArea {
    LambertAzimuthalEqualArea::new(6_378_137.0, 298.257222101, 52.0, 10.0, 4_321_000.0, 3_210_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_origin_maps_to_false_origin() {
        let projection = etrs89_laea();
        let (easting, northing) = projection.forward(10.0, 52.0).unwrap();
        assert!((easting - 4_321_000.0).abs() < 1e-6, "easting {easting}");
        assert!((northing - 3_210_000.0).abs() < 1e-6, "northing {northing}");
    }

    // Worked example from EPSG guidance note 7-2 for method 9820.
    #[test]
    fn matches_epsg_worked_example() {
        let projection = etrs89_laea();
        let (easting, northing) = projection.forward(5.0, 50.0).unwrap();
        assert!((easting - 3_962_799.45).abs() < 0.02, "easting {easting}");
        assert!((northing - 2_999_718.85).abs() < 0.02, "northing {northing}");
    }

    #[test]
    fn poles_project_without_error() {
        let projection = etrs89_laea();
        let (_, northing) = projection.forward(10.0, 90.0).unwrap();
        assert!(northing > 3_210_000.0);
        projection.forward(10.0, -90.0).unwrap();
    }

    #[test]
    fn rejects_out_of_domain_coordinates() {
        let projection = etrs89_laea();
        assert!(matches!(
            projection.forward(10.0, 91.0),
            Err(DemError::Projection(_))
        ));
        assert!(matches!(
            projection.forward(181.0, 52.0),
            Err(DemError::Projection(_))
        ));
    }

    #[test]
    fn easting_increases_eastward_and_northing_northward() {
        let projection = etrs89_laea();
        let (e_west, _) = projection.forward(5.0, 50.0).unwrap();
        let (e_east, _) = projection.forward(15.0, 50.0).unwrap();
        assert!(e_west < e_east);

        let (_, n_south) = projection.forward(10.0, 45.0).unwrap();
        let (_, n_north) = projection.forward(10.0, 55.0).unwrap();
        assert!(n_south < n_north);
    }
}

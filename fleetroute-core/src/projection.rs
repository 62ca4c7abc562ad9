//! Universal Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Road graphs are projected into the UTM zone of their centroid so that
//! nearest-node searches and planar distances are metric. Formulas follow
//! the series expansions in Snyder, *Map Projections: A Working Manual*
//! (USGS Professional Paper 1395), accurate to well under a millimetre
//! within a zone.

use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// UTM is undefined near the poles; UPS covers those regions instead.
const MIN_LATITUDE: f64 = -80.0;
const MAX_LATITUDE: f64 = 84.0;

/// Errors raised while projecting coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// Input contained NaN or infinite components.
    #[error("cannot project non-finite coordinate ({x}, {y})")]
    NonFinite {
        /// Longitude or easting.
        x: f64,
        /// Latitude or northing.
        y: f64,
    },
    /// Latitude lies outside the band UTM covers.
    #[error("latitude {latitude} is outside the UTM band [-80, 84]")]
    OutOfBand {
        /// Rejected latitude.
        latitude: f64,
    },
    /// Longitude lies outside `[-180, 180]`.
    #[error("longitude {longitude} is outside [-180, 180]")]
    InvalidLongitude {
        /// Rejected longitude.
        longitude: f64,
    },
}

/// A single UTM zone.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use fleetroute_core::UtmProjection;
///
/// # fn main() -> Result<(), fleetroute_core::ProjectionError> {
/// let utm = UtmProjection::for_coord(Coord { x: -117.82, y: 33.68 })?;
/// assert_eq!(utm.zone(), 11);
/// let planar = utm.project(Coord { x: -117.82, y: 33.68 })?;
/// let back = utm.unproject(planar)?;
/// assert!((back.x + 117.82).abs() < 1e-9);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmProjection {
    zone: u8,
    north: bool,
}

impl UtmProjection {
    /// Select the zone containing `coord` (`x = longitude`, `y = latitude`).
    ///
    /// # Errors
    /// Returns [`ProjectionError`] for non-finite input or a coordinate
    /// outside the UTM band.
    #[expect(
        clippy::float_arithmetic,
        reason = "zone selection divides the shifted longitude into 6° bands"
    )]
    pub fn for_coord(coord: Coord<f64>) -> Result<Self, ProjectionError> {
        validate_geographic(coord)?;
        let zone_index = ((coord.x + 180.0) / 6.0).floor().clamp(0.0, 59.0);
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "zone index is clamped to 0..=59"
        )]
        let zone = zone_index as u8 + 1;
        Ok(Self {
            zone,
            north: coord.y >= 0.0,
        })
    }

    /// Zone number in `1..=60`.
    #[must_use]
    pub const fn zone(&self) -> u8 {
        self.zone
    }

    /// Whether the zone uses the northern-hemisphere false northing.
    #[must_use]
    pub const fn is_north(&self) -> bool {
        self.north
    }

    /// EPSG code of the WGS84 / UTM zone.
    #[must_use]
    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + u32::from(self.zone)
    }

    #[expect(clippy::float_arithmetic, reason = "zone centre in degrees")]
    fn central_meridian(self) -> f64 {
        (f64::from(self.zone) - 1.0).mul_add(6.0, -180.0) + 3.0
    }

    const fn false_northing(self) -> f64 {
        if self.north { 0.0 } else { FALSE_NORTHING_SOUTH }
    }

    /// Project a geographic coordinate to planar easting (`x`) and northing
    /// (`y`) in meters.
    ///
    /// # Errors
    /// Returns [`ProjectionError`] for non-finite input or a coordinate
    /// outside the UTM band.
    #[expect(
        clippy::float_arithmetic,
        reason = "the transverse Mercator series is floating-point arithmetic"
    )]
    pub fn project(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        validate_geographic(coord)?;
        let e2 = eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);
        let phi = coord.y.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (coord.x - self.central_meridian()).to_radians();
        let m = meridian_arc(phi);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let easting = SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + FALSE_EASTING;
        let northing = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0))
            + self.false_northing();

        Ok(Coord {
            x: easting,
            y: northing,
        })
    }

    /// Invert [`Self::project`], returning `x = longitude`, `y = latitude`.
    ///
    /// # Errors
    /// Returns [`ProjectionError::NonFinite`] when either planar component is
    /// NaN or infinite.
    #[expect(
        clippy::float_arithmetic,
        reason = "the inverse transverse Mercator series is floating-point arithmetic"
    )]
    pub fn unproject(&self, planar: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        if !planar.x.is_finite() || !planar.y.is_finite() {
            return Err(ProjectionError::NonFinite {
                x: planar.x,
                y: planar.y,
            });
        }
        let e2 = eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let m = (planar.y - self.false_northing()) / SCALE_FACTOR;
        let mu = m / (SEMI_MAJOR_AXIS * meridian_factor(e2));
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = phi1.tan();
        let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = SEMI_MAJOR_AXIS / denom.sqrt();
        let t1 = tan_phi1 * tan_phi1;
        let c1 = ep2 * cos_phi1 * cos_phi1;
        let r1 = SEMI_MAJOR_AXIS * (1.0 - e2) / denom.powf(1.5);
        let d = (planar.x - FALSE_EASTING) / (n1 * SCALE_FACTOR);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos_phi1;

        Ok(Coord {
            x: self.central_meridian() + lambda.to_degrees(),
            y: phi.to_degrees(),
        })
    }
}

impl fmt::Display for UtmProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hemisphere = if self.north { 'N' } else { 'S' };
        write!(f, "UTM zone {}{hemisphere} (EPSG:{})", self.zone, self.epsg())
    }
}

#[expect(clippy::float_arithmetic, reason = "ellipsoid constant")]
const fn eccentricity_squared() -> f64 {
    FLATTENING * (2.0 - FLATTENING)
}

#[expect(clippy::float_arithmetic, reason = "series coefficient")]
fn meridian_factor(e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0
}

/// Distance along the central meridian from the equator to latitude `phi`.
#[expect(clippy::float_arithmetic, reason = "meridian arc series")]
fn meridian_arc(phi: f64) -> f64 {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    SEMI_MAJOR_AXIS
        * (meridian_factor(e2) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

fn validate_geographic(coord: Coord<f64>) -> Result<(), ProjectionError> {
    if !coord.x.is_finite() || !coord.y.is_finite() {
        return Err(ProjectionError::NonFinite {
            x: coord.x,
            y: coord.y,
        });
    }
    if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&coord.y) {
        return Err(ProjectionError::OutOfBand { latitude: coord.y });
    }
    if !(-180.0..=180.0).contains(&coord.x) {
        return Err(ProjectionError::InvalidLongitude { longitude: coord.x });
    }
    Ok(())
}

//! Great-circle distance and speed conversions shared by the cost model.

use geo::Coord;

/// Spherical Earth radius used by [`haversine_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Average speed assumed whenever a travel time has to be estimated from a
/// distance.
pub const FALLBACK_SPEED_KPH: f64 = 30.0;

/// Great-circle distance between two WGS84 coordinates (`x = longitude`,
/// `y = latitude`), in meters.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use fleetroute_core::haversine_meters;
///
/// let irvine = Coord { x: -117.8265, y: 33.6846 };
/// assert_eq!(haversine_meters(irvine, irvine), 0.0);
/// ```
#[must_use]
#[expect(clippy::float_arithmetic, reason = "haversine formula")]
pub fn haversine_meters(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let phi1 = a.y.to_radians();
    let phi2 = b.y.to_radians();
    let d_phi = (b.y - a.y).to_radians();
    let d_lambda = (b.x - a.x).to_radians();
    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Seconds needed to cover `meters` at a constant `kph`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "unit conversion")]
pub fn seconds_at_speed(meters: f64, kph: f64) -> f64 {
    meters / 1000.0 / kph * 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        let delta = (actual - expected).abs();
        assert!(
            delta <= tolerance,
            "expected {expected}, got {actual} (|Δ| = {delta})"
        );
    }

    #[rstest]
    fn one_degree_of_latitude() {
        let d = haversine_meters(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 1.0 });
        assert_close(d, 111_194.93, 0.01);
    }

    #[rstest]
    fn irvine_to_los_angeles() {
        let irvine = Coord { x: -117.8265, y: 33.6846 };
        let la = Coord { x: -118.2437, y: 34.0522 };
        let d = haversine_meters(irvine, la);
        assert!((55_000.0..57_000.0).contains(&d), "got {d}");
        assert_close(d, haversine_meters(la, irvine), 1e-6);
    }

    #[rstest]
    #[case(30_000.0, 30.0, 3600.0)]
    #[case(500.0, 30.0, 60.0)]
    #[case(0.0, 30.0, 0.0)]
    fn converts_distance_to_time(#[case] meters: f64, #[case] kph: f64, #[case] seconds: f64) {
        assert_close(seconds_at_speed(meters, kph), seconds, 1e-9);
    }
}

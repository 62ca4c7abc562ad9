//! Tag semantics for drivable OSM ways.
//!
//! Mirrors the `drive` network type used by common OSM routing tools:
//! public roads open to motor vehicles, excluding service alleys, parking
//! aisles and driveways.

/// Highway values that never carry general motor traffic.
const EXCLUDED_HIGHWAYS: &[&str] = &[
    "abandoned",
    "bridleway",
    "bus_guideway",
    "construction",
    "corridor",
    "cycleway",
    "elevator",
    "escalator",
    "footway",
    "no",
    "path",
    "pedestrian",
    "planned",
    "platform",
    "proposed",
    "raceway",
    "razed",
    "service",
    "steps",
    "track",
];

const EXCLUDED_SERVICES: &[&str] = &[
    "alley",
    "driveway",
    "emergency_access",
    "parking",
    "parking_aisle",
    "private",
];

const MILES_TO_KILOMETERS: f64 = 1.609_344;

/// Direction(s) in which a way may be driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelDirection {
    /// Only in node order.
    Forward,
    /// Only against node order.
    Reverse,
    /// Both ways.
    Both,
}

/// Borrowed view over a way's tags.
pub trait TagLookup {
    /// Value of `key`, if present.
    fn tag(&self, key: &str) -> Option<&str>;
}

impl<S: std::hash::BuildHasher> TagLookup for std::collections::HashMap<String, String, S> {
    fn tag(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl TagLookup for [(String, String)] {
    fn tag(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl TagLookup for Vec<(String, String)> {
    fn tag(&self, key: &str) -> Option<&str> {
        self.as_slice().tag(key)
    }
}

/// Whether a way with `tags` belongs to the drivable network.
#[must_use]
pub fn is_drivable<T: TagLookup + ?Sized>(tags: &T) -> bool {
    let Some(highway) = tags.tag("highway") else {
        return false;
    };
    if EXCLUDED_HIGHWAYS.contains(&highway) {
        return false;
    }
    if tags.tag("area") == Some("yes") {
        return false;
    }
    if tags.tag("access") == Some("private") {
        return false;
    }
    if tags.tag("motor_vehicle") == Some("no") || tags.tag("motorcar") == Some("no") {
        return false;
    }
    !tags
        .tag("service")
        .is_some_and(|service| EXCLUDED_SERVICES.contains(&service))
}

/// Driving direction implied by `oneway` and `junction`.
///
/// `yes`, `true` and `1` and roundabouts are one-way in node order; `-1`
/// and `reverse` are one-way against it. Anything else is two-way.
#[must_use]
pub fn travel_direction<T: TagLookup + ?Sized>(tags: &T) -> TravelDirection {
    match tags.tag("oneway").map(str::trim) {
        Some("yes" | "true" | "1") => TravelDirection::Forward,
        Some("-1" | "reverse") => TravelDirection::Reverse,
        Some(_) => TravelDirection::Both,
        None if tags.tag("junction") == Some("roundabout") => TravelDirection::Forward,
        None => TravelDirection::Both,
    }
}

/// Parse a `maxspeed` value into km/h.
///
/// Accepts plain numbers (km/h), values suffixed with `mph` or `km/h`, and
/// `;`-separated lists, which are averaged. Returns `None` when no part of
/// the value is numeric, e.g. `signals` or `none`.
///
/// # Examples
/// ```
/// use fleetroute_data::osm::parse_maxspeed;
///
/// assert_eq!(parse_maxspeed("50"), Some(50.0));
/// assert_eq!(parse_maxspeed("40;60"), Some(50.0));
/// assert_eq!(parse_maxspeed("walk"), None);
/// ```
#[must_use]
#[expect(clippy::float_arithmetic, reason = "mean of listed speeds")]
pub fn parse_maxspeed(raw: &str) -> Option<f64> {
    let speeds: Vec<f64> = raw.split(';').filter_map(parse_single_speed).collect();
    if speeds.is_empty() {
        return None;
    }
    #[expect(clippy::cast_precision_loss, reason = "a handful of list entries")]
    let count = speeds.len() as f64;
    Some(speeds.iter().sum::<f64>() / count)
}

#[expect(clippy::float_arithmetic, reason = "unit conversion")]
fn parse_single_speed(part: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 3] = [("mph", MILES_TO_KILOMETERS), ("km/h", 1.0), ("kmh", 1.0)];

    let normalised = part.trim().to_ascii_lowercase();
    let (number, factor) = UNITS
        .iter()
        .find_map(|(suffix, unit)| normalised.strip_suffix(suffix).map(|n| (n, *unit)))
        .unwrap_or((normalised.as_str(), 1.0));
    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|speed| speed.is_finite() && *speed > 0.0)
        .map(|speed| speed * factor)
}

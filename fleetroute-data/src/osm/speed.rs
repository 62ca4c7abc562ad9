//! Speed imputation for edges without a usable `maxspeed`.

use std::collections::HashMap;

use fleetroute_core::FALLBACK_SPEED_KPH;

/// Typical urban speed in km/h per highway type, used only when the
/// network carries no posted speeds at all.
#[must_use]
pub fn default_speed_kph(highway: &str) -> f64 {
    match highway {
        "motorway" => 100.0,
        "trunk" => 80.0,
        "primary" => 65.0,
        "motorway_link" => 60.0,
        "secondary" => 55.0,
        "trunk_link" => 50.0,
        "tertiary" | "primary_link" => 45.0,
        "unclassified" | "road" | "secondary_link" => 40.0,
        "tertiary_link" => 35.0,
        "living_street" => 10.0,
        _ => FALLBACK_SPEED_KPH,
    }
}

/// Mean posted speed per highway type, learned from the network itself.
///
/// Lookup order for an edge without a posted speed: the mean of its highway
/// type, then the mean over every posted speed, then
/// [`default_speed_kph`].
#[derive(Debug, Default, Clone)]
pub struct SpeedTable {
    by_highway: HashMap<String, (f64, u32)>,
    total: (f64, u32),
}

impl SpeedTable {
    /// Record one edge of `highway` with posted speed `kph`.
    #[expect(clippy::float_arithmetic, reason = "running speed totals")]
    pub fn observe(&mut self, highway: &str, kph: f64) {
        let entry = self.by_highway.entry(highway.to_owned()).or_default();
        entry.0 += kph;
        entry.1 += 1;
        self.total.0 += kph;
        self.total.1 += 1;
    }

    /// Speed to assume for an edge of `highway`.
    #[must_use]
    pub fn impute(&self, highway: &str) -> f64 {
        self.by_highway
            .get(highway)
            .and_then(|&sample| mean(sample))
            .or_else(|| mean(self.total))
            .unwrap_or_else(|| default_speed_kph(highway))
    }
}

#[expect(clippy::float_arithmetic, reason = "mean speed")]
fn mean((sum, count): (f64, u32)) -> Option<f64> {
    (count > 0).then(|| sum / f64::from(count))
}

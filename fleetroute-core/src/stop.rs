//! Stop records as supplied by the stop repository, and the immutable
//! [`StopPoint`] view the optimiser works on.

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted stop name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Longest accepted stop description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Demand weight assumed when a record omits it.
pub const DEFAULT_DEMAND_WEIGHT: f64 = 0.5;

const fn default_demand_weight() -> f64 {
    DEFAULT_DEMAND_WEIGHT
}

/// A stop as stored by the repository.
///
/// `demand_weight` ranges over `[0.0, 1.0]` where `1.0` is the highest
/// passenger demand. The optimiser carries it through but does not weigh
/// routes by it.
///
/// # Examples
/// ```
/// use fleetroute_core::StopRecord;
///
/// # fn main() -> Result<(), fleetroute_core::StopRecordError> {
/// let stop = StopRecord::new("s-1", "Main St", 33.68, -117.82)?;
/// assert_eq!(stop.demand_weight, 0.5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    /// Opaque identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// Relative passenger demand.
    #[serde(default = "default_demand_weight")]
    pub demand_weight: f64,
}

/// Errors returned by [`StopRecord::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StopRecordError {
    /// The stop name was empty.
    #[error("stop {id} must have a name")]
    EmptyName {
        /// Identifier of the offending stop.
        id: String,
    },
    /// A text field exceeded its maximum length.
    #[error("stop {id} {field} exceeds {max} characters")]
    TooLong {
        /// Identifier of the offending stop.
        id: String,
        /// Field that overflowed.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },
    /// Latitude was outside `[-90, 90]` or not finite.
    #[error("stop {id} latitude {value} is outside [-90, 90]")]
    InvalidLatitude {
        /// Identifier of the offending stop.
        id: String,
        /// Rejected value.
        value: f64,
    },
    /// Longitude was outside `[-180, 180]` or not finite.
    #[error("stop {id} longitude {value} is outside [-180, 180]")]
    InvalidLongitude {
        /// Identifier of the offending stop.
        id: String,
        /// Rejected value.
        value: f64,
    },
    /// Demand weight was outside `[0, 1]` or not finite.
    #[error("stop {id} demand weight {value} is outside [0, 1]")]
    InvalidDemandWeight {
        /// Identifier of the offending stop.
        id: String,
        /// Rejected value.
        value: f64,
    },
}

impl StopRecord {
    /// Validates and constructs a [`StopRecord`] with the default demand
    /// weight and no description.
    ///
    /// # Errors
    /// Returns [`StopRecordError`] when the name or coordinates fail
    /// [`Self::validate`].
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, StopRecordError> {
        let record = Self {
            id: id.into(),
            name: name.into(),
            description: None,
            latitude,
            longitude,
            demand_weight: DEFAULT_DEMAND_WEIGHT,
        };
        record.validate()?;
        Ok(record)
    }

    /// Replace the demand weight, re-validating the record.
    ///
    /// # Errors
    /// Returns [`StopRecordError::InvalidDemandWeight`] when the weight lies
    /// outside `[0, 1]`.
    pub fn with_demand_weight(mut self, demand_weight: f64) -> Result<Self, StopRecordError> {
        self.demand_weight = demand_weight;
        self.validate()?;
        Ok(self)
    }

    /// Check field ranges. Records deserialised from JSON should be validated
    /// before they reach the optimiser.
    ///
    /// # Errors
    /// Returns the first [`StopRecordError`] found: an empty or overlong
    /// name, an overlong description, an out-of-range coordinate or demand
    /// weight.
    pub fn validate(&self) -> Result<(), StopRecordError> {
        if self.name.trim().is_empty() {
            return Err(StopRecordError::EmptyName {
                id: self.id.clone(),
            });
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(self.too_long("name", MAX_NAME_LEN));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(self.too_long("description", MAX_DESCRIPTION_LEN));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(StopRecordError::InvalidLatitude {
                id: self.id.clone(),
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(StopRecordError::InvalidLongitude {
                id: self.id.clone(),
                value: self.longitude,
            });
        }
        if !(0.0..=1.0).contains(&self.demand_weight) {
            return Err(StopRecordError::InvalidDemandWeight {
                id: self.id.clone(),
                value: self.demand_weight,
            });
        }
        Ok(())
    }

    fn too_long(&self, field: &'static str, max: usize) -> StopRecordError {
        StopRecordError::TooLong {
            id: self.id.clone(),
            field,
            max,
        }
    }

    /// Position as a `geo` coordinate (`x = longitude`, `y = latitude`).
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// The optimiser's read-only view of a stop.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
pub struct StopPoint {
    /// Identifier copied from the source record.
    pub id: String,
    /// Display name copied from the source record.
    pub name: String,
    /// Geographic position.
    pub location: Coord<f64>,
}

impl StopPoint {
    /// Construct a point from raw latitude and longitude.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: Coord {
                x: longitude,
                y: latitude,
            },
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.x
    }
}

impl From<&StopRecord> for StopPoint {
    fn from(record: &StopRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            location: record.location(),
        }
    }
}

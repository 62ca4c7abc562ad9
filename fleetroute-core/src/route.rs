//! Per-vehicle route records produced by the optimiser.

use serde::{Deserialize, Serialize};

use crate::stop::StopPoint;

/// A geographic position in the route payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Ordered stops assigned to one vehicle.
///
/// `stop_ids[i]` is located at `coordinates[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Index of the vehicle, equal to its cluster index.
    pub bus_index: usize,
    /// Stop identifiers in visiting order.
    pub stop_ids: Vec<String>,
    /// Stop positions in visiting order.
    pub coordinates: Vec<LatLng>,
}

impl Route {
    /// Build a route visiting `stops` in the given order.
    #[must_use]
    pub fn from_stops(bus_index: usize, stops: &[StopPoint]) -> Self {
        let (stop_ids, coordinates) = stops
            .iter()
            .map(|stop| {
                (
                    stop.id.clone(),
                    LatLng {
                        lat: stop.latitude(),
                        lng: stop.longitude(),
                    },
                )
            })
            .unzip();
        Self {
            bus_index,
            stop_ids,
            coordinates,
        }
    }

    /// Number of stops on the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stop_ids.len()
    }

    /// Whether the vehicle has no stops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stop_ids.is_empty()
    }
}

//! Road network sources for the fleetroute engine.
//!
//! Responsibilities:
//! - Turn OpenStreetMap data into the drivable [`fleetroute_core::RoadGraph`]
//!   consumed by [`fleetroute_core::RoadNetworkProvider`].
//! - Encapsulate OSM tag semantics: which ways are drivable, one-way rules,
//!   posted speeds and speed imputation.
//! - Provide adapters for the public Nominatim/Overpass services and for
//!   local PBF extracts.
//!
//! Boundaries:
//! - Caching, snapping and routing live in `fleetroute-core`.
//! - Sources are synchronous; async HTTP stays inside [`OverpassSource`].

#![forbid(unsafe_code)]

pub mod osm;
pub mod overpass;
mod pbf;

pub use overpass::{OverpassSource, OverpassSourceConfig, SourceBuildError};
pub use pbf::{PbfSource, bounds_around};

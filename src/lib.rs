//! Facade crate for the fleetroute bus route optimiser.
//!
//! This crate re-exports the core domain types and exposes the
//! OpenStreetMap network sources behind the `sources` feature.

#![forbid(unsafe_code)]

pub use fleetroute_core::{
    CostSource, LatLng, NetworkSourceError, NetworkStats, OptimizationResponse, OptimizeError,
    RoadGraph, RoadNetwork, RoadNetworkConfig, RoadNetworkError, RoadNetworkProvider,
    RoadNetworkSource, Route, RouteOptimizer, RouteSequencer, SnappedPoint, StopClusterer,
    StopPoint, StopRecord, StopRecordError, StopStore, StraightLineNetwork,
};

#[cfg(feature = "sources")]
pub use fleetroute_data::{OverpassSource, OverpassSourceConfig, PbfSource, SourceBuildError};

#[cfg(feature = "test-support")]
pub use fleetroute_core::test_support;

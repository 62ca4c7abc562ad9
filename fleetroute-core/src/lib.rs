//! Core domain types and algorithms for the fleetroute engine.
//!
//! The crate turns an unordered list of stops into one ordered route per
//! vehicle. It owns:
//!
//! - the stop and route models ([`StopRecord`], [`StopPoint`], [`Route`]);
//! - an owned road graph with nearest-node snapping and travel-time shortest
//!   paths ([`RoadGraph`]), plus its on-disk cache format;
//! - the lazily initialised, cache-backed [`RoadNetworkProvider`];
//! - the [`StopClusterer`], [`RouteSequencer`] and [`RouteOptimizer`]
//!   pipeline.
//!
//! Downloading map data is delegated to a [`RoadNetworkSource`]
//! implementation; the `fleetroute-data` crate provides HTTP and PBF sources.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cluster;
pub mod geodesy;
pub mod graph;
pub mod optimizer;
pub mod projection;
pub mod provider;
pub mod route;
pub mod sequence;
pub mod stop;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use cluster::{ClusterAssignment, ClusterError, ClusteringStrategy, KMeans, KMeansConfig, StopClusterer};
pub use geodesy::{EARTH_RADIUS_METERS, FALLBACK_SPEED_KPH, haversine_meters, seconds_at_speed};
pub use graph::cache::{GraphCacheError, load_graph_cache, write_graph_cache};
pub use graph::{
    Edge, GraphError, Node, NodeId, PathSummary, RoadGraph, RoadGraphBuilder, UNSNAPPED_NODE,
};
pub use optimizer::{OptimizationResponse, OptimizeError, RouteOptimizer};
pub use projection::{ProjectionError, UtmProjection};
pub use provider::{
    CACHE_EXTENSION, DEFAULT_CACHE_DIR, DEFAULT_REGION, NetworkSourceError, NetworkStats,
    RoadNetwork, RoadNetworkConfig, RoadNetworkError,
    RoadNetworkProvider, RoadNetworkSource, SnappedPoint, StraightLineNetwork,
};
pub use route::{LatLng, Route};
pub use sequence::{CostSource, RouteSequencer, TravelCost};
pub use stop::{StopPoint, StopRecord, StopRecordError};
pub use store::{MemoryStopStore, StopStore};

//! Lazily initialised, cache-backed access to a region's road network.
//!
//! [`RoadNetworkProvider`] owns at most one [`RoadGraph`]. The first call to
//! [`RoadNetworkProvider::graph`] loads it from the on-disk cache or, on a
//! miss, downloads it through a [`RoadNetworkSource`] and writes the cache.
//! Loading and downloading are serialised by an internal lock so concurrent
//! callers never download twice. Queries ([`RoadNetwork::snap`],
//! [`RoadNetwork::shortest_path`]) only read the loaded graph and never
//! trigger a download.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::graph::cache::{load_graph_cache, write_graph_cache};
use crate::graph::{GraphError, NodeId, PathSummary, RoadGraph, UNSNAPPED_NODE};
use crate::projection::UtmProjection;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "Irvine, California, USA";

/// Directory holding cached graphs when none is configured.
pub const DEFAULT_CACHE_DIR: &str = "road_networks";

/// Extension of cached graph files.
pub const CACHE_EXTENSION: &str = "graph";

/// Downloads the drivable road graph for a region.
///
/// Implementations must return a graph whose edges carry lengths and, where
/// possible, travel times.
pub trait RoadNetworkSource: Send + Sync {
    /// Fetch the graph for `region`.
    ///
    /// # Errors
    /// Returns a [`NetworkSourceError`] describing why no graph could be
    /// produced.
    fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError>;
}

impl<T: RoadNetworkSource + ?Sized> RoadNetworkSource for Box<T> {
    fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        (**self).fetch(region)
    }
}

/// Failure reported by a [`RoadNetworkSource`].
#[derive(Debug, Error)]
pub enum NetworkSourceError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The request could not be sent or the response not read.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The region name did not resolve to a place.
    #[error("no place found for {query:?}")]
    Geocode {
        /// Region name that was looked up.
        query: String,
    },
    /// A response or map extract could not be parsed.
    #[error("failed to parse map data: {message}")]
    Parse {
        /// Parser error description.
        message: String,
    },
    /// The region contained no drivable roads.
    #[error("no drivable roads found for {region:?}")]
    EmptyNetwork {
        /// Region that was fetched.
        region: String,
    },
    /// A local map extract could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Extract location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The downloaded data did not form a valid graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Error surfaced by [`RoadNetworkProvider::graph`].
#[derive(Debug, Error)]
pub enum RoadNetworkError {
    /// No cached graph was usable and the download failed.
    #[error("failed to download road network for {region:?}: {source}")]
    Download {
        /// Configured region.
        region: String,
        /// Source failure.
        #[source]
        source: NetworkSourceError,
    },
}

/// Region and cache location for a [`RoadNetworkProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadNetworkConfig {
    /// Place name resolved by the network source.
    pub region: String,
    /// Directory holding cached graphs.
    pub cache_dir: Utf8PathBuf,
}

impl RoadNetworkConfig {
    /// Configuration for `region` using the default cache directory.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            cache_dir: Utf8PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }

    /// Override the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Cache file for the configured region.
    ///
    /// # Examples
    /// ```
    /// use fleetroute_core::RoadNetworkConfig;
    ///
    /// let config = RoadNetworkConfig::new("Irvine, California, USA");
    /// assert_eq!(config.cache_file(), "road_networks/Irvine_California_USA.graph");
    /// ```
    #[must_use]
    pub fn cache_file(&self) -> Utf8PathBuf {
        let stem = self.region.replace(", ", "_").replace(' ', "_");
        self.cache_dir.join(format!("{stem}.{CACHE_EXTENSION}"))
    }
}

impl Default for RoadNetworkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

/// Summary of the loaded graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of directed edges.
    pub edge_count: usize,
    /// Configured region.
    pub region_name: String,
    /// Cache file backing the graph.
    pub cache_location: Utf8PathBuf,
    /// Planar reference frame of the node coordinates.
    pub projection: UtmProjection,
    /// EPSG code of [`Self::projection`].
    pub epsg: u32,
}

/// Outcome of snapping a coordinate to the road network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    /// Latitude of the matched node, or the input latitude when unsnapped.
    pub latitude: f64,
    /// Longitude of the matched node, or the input longitude when unsnapped.
    pub longitude: f64,
    /// Matched node, or [`UNSNAPPED_NODE`].
    pub node: NodeId,
}

impl SnappedPoint {
    /// The degraded result: input coordinates and the sentinel node.
    #[must_use]
    pub const fn unsnapped(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            node: UNSNAPPED_NODE,
        }
    }

    /// Whether a graph node was found.
    #[must_use]
    pub const fn is_snapped(&self) -> bool {
        self.node != UNSNAPPED_NODE
    }
}

/// Road-network queries used by the route sequencer.
pub trait RoadNetwork {
    /// Make the network ready for queries. Failing here is the only way a
    /// network problem reaches the caller.
    ///
    /// # Errors
    /// Returns [`RoadNetworkError`] when the network cannot be loaded.
    fn prepare(&self) -> Result<(), RoadNetworkError> {
        Ok(())
    }

    /// Nearest node to a coordinate, or [`SnappedPoint::unsnapped`] on any
    /// failure.
    fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint;

    /// Minimum travel-time path, or `None` when unavailable.
    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<PathSummary>;
}

impl<T: RoadNetwork + ?Sized> RoadNetwork for &T {
    fn prepare(&self) -> Result<(), RoadNetworkError> {
        (**self).prepare()
    }

    fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint {
        (**self).snap(latitude, longitude)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<PathSummary> {
        (**self).shortest_path(from, to)
    }
}

impl<T: RoadNetwork + ?Sized> RoadNetwork for Arc<T> {
    fn prepare(&self) -> Result<(), RoadNetworkError> {
        (**self).prepare()
    }

    fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint {
        (**self).snap(latitude, longitude)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<PathSummary> {
        (**self).shortest_path(from, to)
    }
}

/// A network with no roads; every cost falls back to great-circle distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct StraightLineNetwork;

impl RoadNetwork for StraightLineNetwork {
    fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint {
        SnappedPoint::unsnapped(latitude, longitude)
    }

    fn shortest_path(&self, _from: NodeId, _to: NodeId) -> Option<PathSummary> {
        None
    }
}

/// Owns the road graph for one region.
///
/// # Examples
/// ```
/// use fleetroute_core::{
///     Edge, NetworkSourceError, RoadGraph, RoadGraphBuilder, RoadNetwork, RoadNetworkConfig,
///     RoadNetworkProvider, RoadNetworkSource,
/// };
///
/// struct Offline;
///
/// impl RoadNetworkSource for Offline {
///     fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
///         Err(NetworkSourceError::EmptyNetwork { region: region.to_owned() })
///     }
/// }
///
/// # fn main() -> Result<(), fleetroute_core::GraphError> {
/// let mut builder = RoadGraphBuilder::default();
/// builder.add_node(1, 33.60, -117.80).add_node(2, 33.61, -117.80);
/// builder.add_edge(Edge::new(1, 2, 1_112.0).with_speed(40.0));
/// let provider = RoadNetworkProvider::with_graph(RoadNetworkConfig::default(), Offline, builder.build()?);
///
/// let snapped = provider.snap(33.601, -117.80);
/// assert_eq!(snapped.node, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RoadNetworkProvider<S> {
    config: RoadNetworkConfig,
    source: S,
    graph: RwLock<Option<Arc<RoadGraph>>>,
    init: Mutex<()>,
}

impl<S: RoadNetworkSource> RoadNetworkProvider<S> {
    /// Provider with nothing loaded yet.
    #[must_use]
    pub fn new(config: RoadNetworkConfig, source: S) -> Self {
        Self {
            config,
            source,
            graph: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    /// Provider seeded with an in-memory graph; no cache is read or written
    /// until a refresh.
    #[must_use]
    pub fn with_graph(config: RoadNetworkConfig, source: S, graph: RoadGraph) -> Self {
        let provider = Self::new(config, source);
        provider.store(Arc::new(graph));
        provider
    }

    /// Provider configuration.
    #[must_use]
    pub const fn config(&self) -> &RoadNetworkConfig {
        &self.config
    }

    /// Source used for downloads.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The graph currently in memory, without loading anything.
    #[must_use]
    pub fn loaded_graph(&self) -> Option<Arc<RoadGraph>> {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the graph, loading the cache or downloading on first use.
    ///
    /// With `force_download` the cache is ignored and a fresh graph replaces
    /// both the in-memory copy and the cache file. A cache that fails to load
    /// is logged and treated as a miss.
    ///
    /// # Errors
    /// Returns [`RoadNetworkError::Download`] when no usable graph is in
    /// memory or on disk and the source fails.
    pub fn graph(&self, force_download: bool) -> Result<Arc<RoadGraph>, RoadNetworkError> {
        if !force_download {
            if let Some(graph) = self.loaded_graph() {
                return Ok(graph);
            }
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if !force_download {
            if let Some(graph) = self.loaded_graph() {
                return Ok(graph);
            }
            if let Some(cached) = self.load_cached() {
                let graph = Arc::new(cached);
                self.store(Arc::clone(&graph));
                return Ok(graph);
            }
        }

        let graph = Arc::new(self.download()?);
        self.store(Arc::clone(&graph));
        Ok(graph)
    }

    /// Discard the current graph and download a fresh one.
    ///
    /// # Errors
    /// Returns [`RoadNetworkError::Download`] when the source fails; the
    /// previous graph stays loaded in that case.
    pub fn refresh(&self) -> Result<Arc<RoadGraph>, RoadNetworkError> {
        self.graph(true)
    }

    /// Counts and locations for the graph, loading it if needed.
    ///
    /// # Errors
    /// Fails like [`Self::graph`] when the graph has to be loaded.
    pub fn stats(&self) -> Result<NetworkStats, RoadNetworkError> {
        let graph = self.graph(false)?;
        Ok(NetworkStats {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            region_name: self.config.region.clone(),
            cache_location: self.config.cache_file(),
            projection: graph.projection(),
            epsg: graph.projection().epsg(),
        })
    }

    fn store(&self, graph: Arc<RoadGraph>) {
        *self.graph.write().unwrap_or_else(PoisonError::into_inner) = Some(graph);
    }

    fn load_cached(&self) -> Option<RoadGraph> {
        let path = self.config.cache_file();
        match fleetroute_fs::file_is_file(&path) {
            Ok(true) => {}
            Ok(false) => {
                info!("no cached road network at {path}");
                return None;
            }
            Err(err) => {
                warn!("cannot inspect road network cache {path}: {err}");
                return None;
            }
        }
        match load_graph_cache(&path, &self.config.region) {
            Ok(graph) => {
                info!(
                    "loaded cached road network from {path}: {} nodes, {} edges in {}",
                    graph.node_count(),
                    graph.edge_count(),
                    graph.projection()
                );
                Some(graph)
            }
            Err(err) => {
                warn!("failed to load cached road network from {path}: {err}; downloading a fresh copy");
                None
            }
        }
    }

    fn download(&self) -> Result<RoadGraph, RoadNetworkError> {
        let region = &self.config.region;
        info!("downloading road network for {region}");
        let graph = self
            .source
            .fetch(region)
            .map_err(|source| RoadNetworkError::Download {
                region: region.clone(),
                source,
            })?;
        info!(
            "downloaded road network for {region}: {} nodes, {} edges in {}",
            graph.node_count(),
            graph.edge_count(),
            graph.projection()
        );
        self.persist(&self.config.cache_file(), &graph);
        Ok(graph)
    }

    fn persist(&self, path: &Utf8Path, graph: &RoadGraph) {
        match write_graph_cache(path, &self.config.region, graph) {
            Ok(()) => info!("saved road network to {path}"),
            Err(err) => warn!("failed to cache road network at {path}: {err}"),
        }
    }
}

impl<S: RoadNetworkSource> RoadNetwork for RoadNetworkProvider<S> {
    fn prepare(&self) -> Result<(), RoadNetworkError> {
        self.graph(false).map(|_| ())
    }

    fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint {
        let Some(graph) = self.loaded_graph() else {
            warn!("cannot snap ({latitude}, {longitude}): road network not loaded");
            return SnappedPoint::unsnapped(latitude, longitude);
        };
        let snapped = graph.snap_geographic(Coord {
            x: longitude,
            y: latitude,
        });
        match snapped {
            Ok((node, position)) => SnappedPoint {
                latitude: position.y,
                longitude: position.x,
                node,
            },
            Err(err) => {
                warn!("cannot snap ({latitude}, {longitude}): {err}");
                SnappedPoint::unsnapped(latitude, longitude)
            }
        }
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<PathSummary> {
        let graph = self.loaded_graph()?;
        match graph.shortest_path(from, to) {
            Ok(Some(path)) => Some(path),
            Ok(None) => {
                debug!("no path from node {from} to node {to}");
                None
            }
            Err(err) => {
                debug!("shortest path from {from} to {to} failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::test_support::{CountingSource, FailingSource, StaticSource, grid_graph};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const REGION: &str = "Irvine, California, USA";

    #[fixture]
    fn cache_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, root.join("road_networks"))
    }

    fn counting(dir: &Utf8Path) -> RoadNetworkProvider<CountingSource<StaticSource>> {
        let graph = grid_graph(33.60, -117.80, 4).expect("grid graph");
        RoadNetworkProvider::new(
            RoadNetworkConfig::new(REGION).with_cache_dir(dir),
            CountingSource::new(StaticSource::new(graph)),
        )
    }

    #[rstest]
    #[case("Irvine, California, USA", "Irvine_California_USA.graph")]
    #[case("Los Angeles", "Los_Angeles.graph")]
    #[case("Paris,France", "Paris,France.graph")]
    fn cache_file_normalises_separators(#[case] region: &str, #[case] file: &str) {
        let config = RoadNetworkConfig::new(region).with_cache_dir("cache");
        assert_eq!(config.cache_file(), Utf8PathBuf::from("cache").join(file));
    }

    #[rstest]
    fn first_use_downloads_and_writes_cache(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        assert!(provider.loaded_graph().is_none());

        let graph = provider.graph(false).expect("download");
        assert_eq!(graph.node_count(), 16);
        assert_eq!(provider.source.calls(), 1);
        assert!(fleetroute_fs::file_is_file(&provider.config().cache_file()).expect("stat"));

        provider.graph(false).expect("cached in memory");
        assert_eq!(provider.source.calls(), 1);
    }

    #[rstest]
    fn second_provider_reads_disk_cache(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        counting(&dir).graph(false).expect("seed cache");

        let provider = counting(&dir);
        let graph = provider.graph(false).expect("load cache");
        assert_eq!(provider.source.calls(), 0);
        assert_eq!(graph.node_count(), 16);
    }

    #[rstest]
    fn corrupt_cache_triggers_download(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        fleetroute_fs::write_atomic(&provider.config().cache_file(), b"not a graph")
            .expect("write corrupt cache");

        provider.graph(false).expect("recovers by downloading");
        assert_eq!(provider.source.calls(), 1);
        let reloaded = load_graph_cache(&provider.config().cache_file(), REGION);
        assert!(reloaded.is_ok(), "cache rewritten: {reloaded:?}");
    }

    #[rstest]
    fn force_download_ignores_cache(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        provider.graph(false).expect("download");
        provider.refresh().expect("refresh");
        assert_eq!(provider.source.calls(), 2);
    }

    #[rstest]
    fn failed_download_propagates(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider =
            RoadNetworkProvider::new(RoadNetworkConfig::new(REGION).with_cache_dir(&dir), FailingSource);
        let err = provider.graph(false).expect_err("download fails");
        assert!(matches!(err, RoadNetworkError::Download { ref region, .. } if region == REGION));
        assert!(!fleetroute_fs::file_is_file(&provider.config().cache_file()).expect("stat"));
        assert!(provider.loaded_graph().is_none());
    }

    #[rstest]
    fn concurrent_first_use_downloads_once(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        let barrier = Barrier::new(8);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    provider.graph(false).expect("graph");
                });
            }
        });
        assert_eq!(provider.source.calls(), 1);
    }

    #[rstest]
    fn snap_without_graph_returns_input(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        let snapped = provider.snap(33.6, -117.8);
        assert_eq!(snapped, SnappedPoint::unsnapped(33.6, -117.8));
        assert!(!snapped.is_snapped());
        assert_eq!(provider.source.calls(), 0);
    }

    #[rstest]
    fn snap_returns_node_coordinates() {
        let graph = grid_graph(33.60, -117.80, 3).expect("grid graph");
        let provider = RoadNetworkProvider::with_graph(RoadNetworkConfig::default(), FailingSource, graph);
        let snapped = provider.snap(33.60002, -117.79998);
        assert!(snapped.is_snapped());
        assert!((snapped.latitude - 33.60).abs() < 1e-7);
        assert!((snapped.longitude + 117.80).abs() < 1e-7);
    }

    #[rstest]
    fn snap_failure_degrades_to_input() {
        let graph = grid_graph(33.60, -117.80, 3).expect("grid graph");
        let provider = RoadNetworkProvider::with_graph(RoadNetworkConfig::default(), FailingSource, graph);
        let snapped = provider.snap(89.0, -117.8);
        assert_eq!(snapped, SnappedPoint::unsnapped(89.0, -117.8));
    }

    #[rstest]
    fn unknown_nodes_yield_no_path() {
        let graph = grid_graph(33.60, -117.80, 3).expect("grid graph");
        let provider = RoadNetworkProvider::with_graph(RoadNetworkConfig::default(), FailingSource, graph);
        assert!(provider.shortest_path(1, 9).is_some());
        assert!(provider.shortest_path(1, 999).is_none());
    }

    #[rstest]
    fn stats_report_counts_and_location(#[from(cache_dir)] (_tmp, dir): (TempDir, Utf8PathBuf)) {
        let provider = counting(&dir);
        let stats = provider.stats().expect("stats");
        assert_eq!(stats.node_count, 16);
        assert_eq!(stats.edge_count, 48);
        assert_eq!(stats.region_name, REGION);
        assert_eq!(stats.cache_location, dir.join("Irvine_California_USA.graph"));
        assert_eq!(stats.projection.zone(), 11);
        assert_eq!(stats.epsg, 32_611);
    }

    #[rstest]
    fn straight_line_network_never_snaps() {
        assert!(!StraightLineNetwork.snap(1.0, 2.0).is_snapped());
        assert!(StraightLineNetwork.shortest_path(1, 2).is_none());
        assert!(StraightLineNetwork.prepare().is_ok());
    }
}

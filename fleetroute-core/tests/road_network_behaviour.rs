#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
//! Behavioural tests for the cache-backed road network provider.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use fleetroute_core::{
    Edge, NetworkSourceError, RoadGraph, RoadGraphBuilder, RoadNetwork, RoadNetworkConfig,
    RoadNetworkProvider, RoadNetworkSource, SnappedPoint, UNSNAPPED_NODE,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

/// Serves a four-node block and counts downloads.
#[derive(Default)]
struct BlockSource {
    calls: AtomicUsize,
}

impl RoadNetworkSource for BlockSource {
    fn fetch(&self, _region: &str) -> Result<RoadGraph, NetworkSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut builder = RoadGraphBuilder::default();
        builder
            .add_node(1, 33.600, -117.800)
            .add_node(2, 33.600, -117.799)
            .add_node(3, 33.601, -117.799)
            .add_node(4, 33.601, -117.800);
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
            builder
                .add_edge(Edge::new(a, b, 100.0).with_speed(30.0))
                .add_edge(Edge::new(b, a, 100.0).with_speed(30.0));
        }
        Ok(builder.build()?)
    }
}

struct RoadNetworkWorld {
    cache_dir: TempDir,
    provider: RefCell<Option<RoadNetworkProvider<BlockSource>>>,
    graph: RefCell<Option<Arc<RoadGraph>>>,
    snapped: RefCell<Option<SnappedPoint>>,
}

impl RoadNetworkWorld {
    fn config(&self) -> RoadNetworkConfig {
        let dir = Utf8PathBuf::from_path_buf(self.cache_dir.path().to_path_buf())
            .expect("temp dir should be UTF-8");
        RoadNetworkConfig::new("Test Block, Irvine").with_cache_dir(dir)
    }

    fn fresh_provider(&self) -> RoadNetworkProvider<BlockSource> {
        RoadNetworkProvider::new(self.config(), BlockSource::default())
    }

    fn with_provider<T>(&self, f: impl FnOnce(&RoadNetworkProvider<BlockSource>) -> T) -> T {
        let mut slot = self.provider.borrow_mut();
        let provider = slot.get_or_insert_with(|| self.fresh_provider());
        f(provider)
    }
}

#[fixture]
fn world() -> RoadNetworkWorld {
    RoadNetworkWorld {
        cache_dir: TempDir::new().expect("create temp dir"),
        provider: RefCell::new(None),
        graph: RefCell::new(None),
        snapped: RefCell::new(None),
    }
}

#[given("an empty cache directory")]
fn given_empty_cache(world: &RoadNetworkWorld) {
    assert!(!world.config().cache_file().exists());
}

#[given("a cache written by an earlier provider")]
fn given_warm_cache(world: &RoadNetworkWorld) {
    world
        .fresh_provider()
        .graph(false)
        .expect("earlier provider should download");
    assert!(world.config().cache_file().exists());
}

#[given("a corrupt cache file")]
fn given_corrupt_cache(world: &RoadNetworkWorld) {
    std::fs::write(world.config().cache_file(), b"not a graph").expect("write corrupt cache");
}

#[when("the road network is requested")]
fn when_requested(world: &RoadNetworkWorld) {
    let graph = world.with_provider(|p| p.graph(false)).expect("graph should load");
    world.graph.replace(Some(graph));
}

#[when("the road network is refreshed")]
fn when_refreshed(world: &RoadNetworkWorld) {
    let graph = world.with_provider(RoadNetworkProvider::refresh).expect("refresh should succeed");
    world.graph.replace(Some(graph));
}

#[when("a coordinate is snapped before loading")]
fn when_snapped(world: &RoadNetworkWorld) {
    let snapped = world.with_provider(|p| p.snap(33.6004, -117.7996));
    world.snapped.replace(Some(snapped));
}

#[then("the source has been asked {count} times")]
fn then_calls(world: &RoadNetworkWorld, count: usize) {
    let calls = world.with_provider(|p| p.source().calls.load(Ordering::SeqCst));
    assert_eq!(calls, count);
}

#[then("the cache file exists")]
fn then_cache_exists(world: &RoadNetworkWorld) {
    assert!(world.config().cache_file().is_file());
}

#[then("the graph has {count} nodes")]
fn then_node_count(world: &RoadNetworkWorld, count: usize) {
    let graph = world.graph.borrow();
    let graph = graph.as_ref().expect("graph should be loaded");
    assert_eq!(graph.node_count(), count);
}

#[then("the original coordinate is returned unsnapped")]
fn then_unsnapped(world: &RoadNetworkWorld) {
    let snapped = world.snapped.borrow().expect("snap should have run");
    assert_eq!(snapped.node, UNSNAPPED_NODE);
    assert!((snapped.latitude - 33.6004).abs() < f64::EPSILON);
    assert!((snapped.longitude + 117.7996).abs() < f64::EPSILON);
}

#[scenario(path = "tests/features/road_network.feature", index = 0)]
fn first_request_downloads(world: RoadNetworkWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/road_network.feature", index = 1)]
fn warm_cache(world: RoadNetworkWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/road_network.feature", index = 2)]
fn corrupt_cache(world: RoadNetworkWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/road_network.feature", index = 3)]
fn forced_refresh(world: RoadNetworkWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/road_network.feature", index = 4)]
fn snap_before_loading(world: RoadNetworkWorld) {
    let _ = world;
}

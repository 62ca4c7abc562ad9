#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
//! Behavioural tests for end-to-end route optimisation.

use std::cell::{Cell, RefCell};

use fleetroute_core::{
    ClusterError, ClusteringStrategy, OptimizeError, Route, RouteOptimizer, StopClusterer, StopRecord,
    StraightLineNetwork,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Strategy that ignores geography and labels every point 0.
struct Lopsided;

impl ClusteringStrategy for Lopsided {
    fn assign(&self, points: &[[f64; 2]], _k: usize) -> Result<Vec<usize>, ClusterError> {
        Ok(vec![0; points.len()])
    }
}

#[derive(Default)]
struct OptimizerWorld {
    stops: RefCell<Vec<StopRecord>>,
    lopsided: Cell<bool>,
    outcome: RefCell<Option<Result<Vec<Route>, OptimizeError>>>,
}

impl OptimizerWorld {
    fn routes(&self) -> Vec<Route> {
        self.outcome
            .borrow()
            .as_ref()
            .expect("optimisation should have run")
            .as_ref()
            .expect("optimisation should succeed")
            .clone()
    }
}

fn record(id: &str, lat: f64, lng: f64) -> StopRecord {
    StopRecord::new(id, format!("Stop {id}"), lat, lng).expect("valid stop")
}

#[fixture]
fn world() -> OptimizerWorld {
    OptimizerWorld::default()
}

#[given("three stops near Irvine and three stops near downtown Los Angeles")]
fn given_two_neighbourhoods(world: &OptimizerWorld) {
    world.stops.replace(vec![
        record("s1", 33.60, -117.80),
        record("s2", 33.61, -117.81),
        record("s3", 33.62, -117.79),
        record("n1", 34.05, -118.24),
        record("n2", 34.06, -118.25),
        record("n3", 34.04, -118.23),
    ]);
}

#[given("a single stop")]
fn given_single_stop(world: &OptimizerWorld) {
    world.stops.replace(vec![record("only", 33.60, -117.80)]);
}

#[given("four stops and a clustering that puts everything in one group")]
fn given_lopsided(world: &OptimizerWorld) {
    world.stops.replace(vec![
        record("a", 33.60, -117.80),
        record("b", 33.61, -117.80),
        record("c", 33.62, -117.80),
        record("d", 33.63, -117.80),
    ]);
    world.lopsided.set(true);
}

fn run(world: &OptimizerWorld, buses: usize) {
    let stops = world.stops.borrow();
    let outcome = if world.lopsided.get() {
        RouteOptimizer::with_clusterer(StraightLineNetwork, StopClusterer::new(Lopsided))
            .optimize(&stops, buses)
    } else {
        RouteOptimizer::new(StraightLineNetwork).optimize(&stops, buses)
    };
    world.outcome.replace(Some(outcome));
}

#[when("I optimise the stops for {buses} buses")]
fn when_optimise(world: &OptimizerWorld, buses: usize) {
    run(world, buses);
}

#[when("I optimise the stops for {buses} buses with that clustering")]
fn when_optimise_lopsided(world: &OptimizerWorld, buses: usize) {
    run(world, buses);
}

#[then("{count} routes are returned")]
fn then_route_count(world: &OptimizerWorld, count: usize) {
    let routes = world.routes();
    assert_eq!(routes.len(), count);
    let indices: Vec<usize> = routes.iter().map(|r| r.bus_index).collect();
    assert_eq!(indices, (0..count).collect::<Vec<_>>());
}

#[then("every route holds {count} stops")]
fn then_route_sizes(world: &OptimizerWorld, count: usize) {
    for route in world.routes() {
        assert_eq!(route.len(), count, "route {}", route.bus_index);
        assert_eq!(route.stop_ids.len(), route.coordinates.len());
    }
}

#[then("the southern and northern stops are served by different routes")]
fn then_split_by_region(world: &OptimizerWorld) {
    let routes = world.routes();
    for route in &routes {
        let southern = route.stop_ids.iter().filter(|id| id.starts_with('s')).count();
        assert!(
            southern == 0 || southern == route.len(),
            "route {} mixes regions: {:?}",
            route.bus_index,
            route.stop_ids
        );
    }
    assert_ne!(
        routes[0].stop_ids[0].chars().next(),
        routes[1].stop_ids[0].chars().next()
    );
}

#[then("exactly one route holds the stop")]
fn then_one_busy_route(world: &OptimizerWorld) {
    let routes = world.routes();
    let busy: Vec<&Route> = routes.iter().filter(|r| !r.is_empty()).collect();
    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].stop_ids, ["only"]);
}

#[then("the request is rejected as an invalid argument")]
fn then_invalid_argument(world: &OptimizerWorld) {
    let outcome = world.outcome.borrow();
    let result = outcome.as_ref().expect("optimisation should have run");
    assert!(
        matches!(result, Err(OptimizeError::InvalidArgument(_))),
        "unexpected outcome: {result:?}"
    );
}

#[scenario(path = "tests/features/optimizer.feature", index = 0)]
fn distant_neighbourhoods(world: OptimizerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/optimizer.feature", index = 1)]
fn more_buses_than_stops(world: OptimizerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/optimizer.feature", index = 2)]
fn zero_buses(world: OptimizerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/optimizer.feature", index = 3)]
fn lopsided_clustering(world: OptimizerWorld) {
    let _ = world;
}

//! Nearest-neighbour ordering of the stops within one cluster.

use crate::geodesy::{FALLBACK_SPEED_KPH, haversine_meters, seconds_at_speed};
use crate::provider::{RoadNetwork, SnappedPoint};
use crate::stop::StopPoint;

/// Which tier of the cost model produced a [`TravelCost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostSource {
    /// Summed edge travel times along the road path.
    RoadTravelTime,
    /// Road path length at the fallback speed; the path had no travel times.
    RoadLength,
    /// Great-circle distance at the fallback speed.
    GreatCircle,
}

/// Estimated travel time between two stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelCost {
    /// Estimated seconds.
    pub seconds: f64,
    /// Tier that produced the estimate.
    pub source: CostSource,
}

impl TravelCost {
    fn great_circle(a: &StopPoint, b: &StopPoint) -> Self {
        Self {
            seconds: seconds_at_speed(haversine_meters(a.location, b.location), FALLBACK_SPEED_KPH),
            source: CostSource::GreatCircle,
        }
    }
}

/// Orders stops with a greedy nearest-neighbour tour over road travel times.
///
/// # Examples
/// ```
/// use fleetroute_core::{RouteSequencer, StopPoint, StraightLineNetwork};
///
/// let sequencer = RouteSequencer::new(&StraightLineNetwork);
/// let ordered = sequencer.order(vec![
///     StopPoint::new("far", "Far", 33.70, -117.80),
///     StopPoint::new("start", "Start", 33.60, -117.80),
///     StopPoint::new("near", "Near", 33.61, -117.80),
/// ]);
/// let ids: Vec<_> = ordered.iter().map(|s| s.id.as_str()).collect();
/// assert_eq!(ids, ["start", "near", "far"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RouteSequencer<'a, N: ?Sized> {
    network: &'a N,
}

impl<'a, N: RoadNetwork + ?Sized> RouteSequencer<'a, N> {
    /// Sequencer drawing costs from `network`.
    #[must_use]
    pub const fn new(network: &'a N) -> Self {
        Self { network }
    }

    /// Travel cost from `a` to `b`.
    ///
    /// Both stops are snapped to the road network and routed by travel time.
    /// A path without travel times is costed by length at 30 km/h. A failed
    /// snap, a missing path or a zero-cost path falls back to great-circle
    /// distance at 30 km/h.
    #[must_use]
    pub fn travel_cost(&self, a: &StopPoint, b: &StopPoint) -> TravelCost {
        let from = self.network.snap(a.latitude(), a.longitude());
        let to = self.network.snap(b.latitude(), b.longitude());
        self.cost_between(a, from, b, to)
    }

    fn cost_between(
        &self,
        a: &StopPoint,
        from: SnappedPoint,
        b: &StopPoint,
        to: SnappedPoint,
    ) -> TravelCost {
        if !from.is_snapped() || !to.is_snapped() {
            return TravelCost::great_circle(a, b);
        }
        let Some(path) = self.network.shortest_path(from.node, to.node) else {
            return TravelCost::great_circle(a, b);
        };
        if path.travel_time_seconds > 0.0 {
            return TravelCost {
                seconds: path.travel_time_seconds,
                source: CostSource::RoadTravelTime,
            };
        }
        if path.length_meters > 0.0 {
            return TravelCost {
                seconds: seconds_at_speed(path.length_meters, FALLBACK_SPEED_KPH),
                source: CostSource::RoadLength,
            };
        }
        TravelCost::great_circle(a, b)
    }

    /// Visit order for `cluster`, a permutation of its stops.
    ///
    /// The tour starts at the stop with the smallest `(latitude, longitude)`
    /// and repeatedly moves to the cheapest unvisited stop. Ties go to the
    /// stop listed first. Each stop is snapped once.
    #[must_use]
    pub fn order(&self, cluster: Vec<StopPoint>) -> Vec<StopPoint> {
        if cluster.len() <= 1 {
            return cluster;
        }
        let mut remaining: Vec<(StopPoint, SnappedPoint)> = cluster
            .into_iter()
            .map(|stop| {
                let snap = self.network.snap(stop.latitude(), stop.longitude());
                (stop, snap)
            })
            .collect();
        let first = remaining
            .iter()
            .enumerate()
            .min_by(|(_, (a, _)), (_, (b, _))| {
                a.latitude()
                    .total_cmp(&b.latitude())
                    .then(a.longitude().total_cmp(&b.longitude()))
            })
            .map_or(0, |(position, _)| position);

        let mut tour = Vec::with_capacity(remaining.len());
        let mut current = remaining.remove(first);
        while let Some(position) = self.cheapest_next(&current, &remaining) {
            let next = remaining.remove(position);
            tour.push(std::mem::replace(&mut current, next).0);
        }
        tour.push(current.0);
        tour
    }

    /// Position of the cheapest stop in `candidates`; the first wins ties.
    fn cheapest_next(
        &self,
        (from, from_snap): &(StopPoint, SnappedPoint),
        candidates: &[(StopPoint, SnappedPoint)],
    ) -> Option<usize> {
        candidates
            .iter()
            .map(|(to, to_snap)| self.cost_between(from, *from_snap, to, *to_snap).seconds)
            .enumerate()
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(position, _)| position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, PathSummary};
    use crate::provider::StraightLineNetwork;
    use crate::test_support::grid_graph;
    use crate::{RoadNetworkConfig, RoadNetworkProvider, test_support::FailingSource};
    use rstest::rstest;

    /// Snaps every stop to node 1 or 2 by latitude and answers every path
    /// query with a fixed summary.
    struct FixedPath(Option<PathSummary>);

    impl RoadNetwork for FixedPath {
        fn snap(&self, latitude: f64, longitude: f64) -> SnappedPoint {
            SnappedPoint {
                latitude,
                longitude,
                node: if latitude < 34.0 { 1 } else { 2 },
            }
        }

        fn shortest_path(&self, _from: NodeId, _to: NodeId) -> Option<PathSummary> {
            self.0.clone()
        }
    }

    fn summary(length_meters: f64, travel_time_seconds: f64) -> Option<PathSummary> {
        Some(PathSummary {
            nodes: vec![1, 2],
            length_meters,
            travel_time_seconds,
        })
    }

    fn stop(id: &str, lat: f64, lng: f64) -> StopPoint {
        StopPoint::new(id, id, lat, lng)
    }

    fn ids(stops: &[StopPoint]) -> Vec<&str> {
        stops.iter().map(|s| s.id.as_str()).collect()
    }

    #[rstest]
    #[case(summary(1_000.0, 95.0), 95.0, CostSource::RoadTravelTime)]
    #[case(summary(1_000.0, 0.0), 120.0, CostSource::RoadLength)]
    fn road_costs(
        #[case] path: Option<PathSummary>,
        #[case] seconds: f64,
        #[case] source: CostSource,
    ) {
        let network = FixedPath(path);
        let cost = RouteSequencer::new(&network).travel_cost(&stop("a", 33.6, -117.8), &stop("b", 34.1, -117.8));
        assert_eq!(cost.source, source);
        assert!((cost.seconds - seconds).abs() < 1e-9, "got {}", cost.seconds);
    }

    #[rstest]
    #[case(None)]
    #[case(summary(0.0, 0.0))]
    fn missing_or_empty_path_uses_great_circle(#[case] path: Option<PathSummary>) {
        let network = FixedPath(path);
        let (a, b) = (stop("a", 33.6, -117.8), stop("b", 34.1, -117.8));
        let cost = RouteSequencer::new(&network).travel_cost(&a, &b);
        assert_eq!(cost.source, CostSource::GreatCircle);
        let expected = seconds_at_speed(haversine_meters(a.location, b.location), 30.0);
        assert!((cost.seconds - expected).abs() < 1e-9);
    }

    #[rstest]
    fn unloaded_provider_falls_back_to_great_circle() {
        let provider = RoadNetworkProvider::new(RoadNetworkConfig::default(), FailingSource);
        let cost = RouteSequencer::new(&provider).travel_cost(&stop("a", 33.6, -117.8), &stop("b", 33.7, -117.8));
        assert_eq!(cost.source, CostSource::GreatCircle);
        assert!(cost.seconds > 0.0);
    }

    #[rstest]
    fn loaded_provider_routes_over_roads() {
        let graph = grid_graph(33.600, -117.800, 5).expect("grid graph");
        let provider = RoadNetworkProvider::with_graph(RoadNetworkConfig::default(), FailingSource, graph);
        let cost = RouteSequencer::new(&provider).travel_cost(&stop("a", 33.600, -117.800), &stop("b", 33.603, -117.797));
        assert_eq!(cost.source, CostSource::RoadTravelTime);
        let straight = seconds_at_speed(
            haversine_meters(stop("a", 33.600, -117.800).location, stop("b", 33.603, -117.797).location),
            30.0,
        );
        assert!(cost.seconds > straight, "road {} vs straight {straight}", cost.seconds);
    }

    #[rstest]
    fn identical_coordinates_cost_nothing() {
        let a = stop("a", 33.6, -117.8);
        let cost = RouteSequencer::new(&StraightLineNetwork).travel_cost(&a, &a.clone());
        assert_eq!(cost.seconds, 0.0);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![stop("solo", 33.6, -117.8)])]
    fn short_clusters_are_returned_unchanged(#[case] cluster: Vec<StopPoint>) {
        let ordered = RouteSequencer::new(&StraightLineNetwork).order(cluster.clone());
        assert_eq!(ordered, cluster);
    }

    #[rstest]
    fn starts_at_smallest_latitude_then_longitude() {
        let cluster = vec![
            stop("c", 33.62, -117.79),
            stop("b", 33.60, -117.79),
            stop("a", 33.60, -117.80),
        ];
        let ordered = RouteSequencer::new(&StraightLineNetwork).order(cluster);
        assert_eq!(ordered[0].id, "a");
    }

    #[rstest]
    fn follows_nearest_unvisited_stop() {
        let cluster = vec![
            stop("d", 33.640, -117.800),
            stop("b", 33.610, -117.800),
            stop("a", 33.600, -117.800),
            stop("c", 33.625, -117.800),
        ];
        let ordered = RouteSequencer::new(&StraightLineNetwork).order(cluster);
        assert_eq!(ids(&ordered), ["a", "b", "c", "d"]);
    }

    #[rstest]
    fn equal_costs_prefer_the_earlier_stop() {
        let cluster = vec![
            stop("origin", 33.600, 0.0),
            stop("east", 33.610, 0.01),
            stop("west", 33.610, -0.01),
        ];
        let ordered = RouteSequencer::new(&StraightLineNetwork).order(cluster);
        assert_eq!(ids(&ordered), ["origin", "east", "west"]);
    }
}

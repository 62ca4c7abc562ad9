//! Fake network sources and graph fixtures for unit and behaviour tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use geo::Coord;

use crate::geodesy::haversine_meters;
use crate::graph::{Edge, GraphError, NodeId, RoadGraph, RoadGraphBuilder};
use crate::provider::{NetworkSourceError, RoadNetworkSource};

/// Grid spacing used by [`grid_graph`], in degrees.
pub const GRID_SPACING_DEGREES: f64 = 0.001;

/// Square `size × size` grid of two-way residential streets starting at
/// `origin_lat`/`origin_lon` and growing north and east.
///
/// Node ids run row by row from 1. Edges carry haversine lengths and a
/// 30 km/h speed.
///
/// # Errors
/// Returns [`GraphError`] when the grid leaves the UTM band.
pub fn grid_graph(origin_lat: f64, origin_lon: f64, size: u16) -> Result<RoadGraph, GraphError> {
    let side = i64::from(size);
    let id = |row: i64, col: i64| -> NodeId { row * side + col + 1 };
    let position = |row: i64, col: i64| {
        #[expect(clippy::cast_precision_loss, reason = "grid indices are tiny")]
        let (r, c) = (row as f64, col as f64);
        Coord {
            x: c.mul_add(GRID_SPACING_DEGREES, origin_lon),
            y: r.mul_add(GRID_SPACING_DEGREES, origin_lat),
        }
    };

    let mut builder = RoadGraphBuilder::default();
    for row in 0..side {
        for col in 0..side {
            let at = position(row, col);
            builder.add_node(id(row, col), at.y, at.x);
        }
    }
    let mut link = |a: (i64, i64), b: (i64, i64)| {
        let length = haversine_meters(position(a.0, a.1), position(b.0, b.1));
        for (from, to) in [(a, b), (b, a)] {
            builder.add_edge(
                Edge::new(id(from.0, from.1), id(to.0, to.1), length)
                    .with_speed(30.0)
                    .with_highway("residential"),
            );
        }
    };
    for row in 0..side {
        for col in 0..side {
            if col + 1 < side {
                link((row, col), (row, col + 1));
            }
            if row + 1 < side {
                link((row, col), (row + 1, col));
            }
        }
    }
    builder.build()
}

/// Source that always returns a clone of one graph.
#[derive(Debug, Clone)]
pub struct StaticSource {
    graph: RoadGraph,
}

impl StaticSource {
    /// Serve `graph` for every region.
    #[must_use]
    pub const fn new(graph: RoadGraph) -> Self {
        Self { graph }
    }
}

impl RoadNetworkSource for StaticSource {
    fn fetch(&self, _region: &str) -> Result<RoadGraph, NetworkSourceError> {
        Ok(self.graph.clone())
    }
}

/// Source whose downloads always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSource;

impl RoadNetworkSource for FailingSource {
    fn fetch(&self, _region: &str) -> Result<RoadGraph, NetworkSourceError> {
        Err(NetworkSourceError::Network {
            url: "test://unreachable".to_owned(),
            message: "connection refused".to_owned(),
        })
    }
}

/// Wraps a source and counts `fetch` calls.
#[derive(Debug)]
pub struct CountingSource<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingSource<S> {
    /// Count calls forwarded to `inner`.
    #[must_use]
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: RoadNetworkSource> RoadNetworkSource for CountingSource<S> {
    fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(region)
    }
}

//! Owned drivable road graph with nearest-node snapping and travel-time
//! shortest paths.
//!
//! Nodes carry both geographic and projected (UTM) coordinates. Nearest-node
//! queries run against an R\*-tree over the projected positions so distances
//! are metric. Shortest paths use Dijkstra's algorithm weighted by edge
//! travel time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use geo::Coord;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geodesy::{FALLBACK_SPEED_KPH, seconds_at_speed};
use crate::projection::{ProjectionError, UtmProjection};

pub mod cache;

/// OSM node identifier.
pub type NodeId = i64;

/// Node id reported when a coordinate could not be snapped to the graph.
pub const UNSNAPPED_NODE: NodeId = -1;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// A graph vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// OSM node identifier.
    pub id: NodeId,
    /// WGS84 latitude in degrees.
    pub lat: f64,
    /// WGS84 longitude in degrees.
    pub lon: f64,
    /// Projected easting in meters.
    pub x: f64,
    /// Projected northing in meters.
    pub y: f64,
}

/// A directed road segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Tail node.
    pub from: NodeId,
    /// Head node.
    pub to: NodeId,
    /// Segment length in meters.
    pub length_m: f64,
    /// Assumed travel speed, when known or imputed.
    pub speed_kph: Option<f64>,
    /// Traversal time in seconds, when known.
    pub travel_time_s: Option<f64>,
    /// OSM `highway` classification.
    pub highway: Option<String>,
}

impl Edge {
    /// A bare edge with only a length.
    #[must_use]
    pub const fn new(from: NodeId, to: NodeId, length_m: f64) -> Self {
        Self {
            from,
            to,
            length_m,
            speed_kph: None,
            travel_time_s: None,
            highway: None,
        }
    }

    /// Attach a speed and derive the travel time from it.
    #[must_use]
    pub fn with_speed(mut self, speed_kph: f64) -> Self {
        self.speed_kph = Some(speed_kph);
        self.travel_time_s = Some(seconds_at_speed(self.length_m, speed_kph));
        self
    }

    /// Attach an explicit travel time.
    #[must_use]
    pub const fn with_travel_time(mut self, seconds: f64) -> Self {
        self.travel_time_s = Some(seconds);
        self
    }

    /// Attach the OSM highway class.
    #[must_use]
    pub fn with_highway(mut self, highway: impl Into<String>) -> Self {
        self.highway = Some(highway.into());
        self
    }

    /// Dijkstra weight: travel time when present, else length at the
    /// fallback speed.
    fn weight_seconds(&self) -> f64 {
        match self.travel_time_s {
            Some(t) if t.is_finite() && t >= 0.0 => t,
            _ => seconds_at_speed(self.length_m.max(0.0), FALLBACK_SPEED_KPH),
        }
    }
}

/// Result of a shortest-path query.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSummary {
    /// Visited node ids, source first.
    pub nodes: Vec<NodeId>,
    /// Summed edge length.
    pub length_meters: f64,
    /// Summed edge travel time, counting only edges that carry one.
    pub travel_time_seconds: f64,
}

/// Errors raised by graph construction and queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The graph has no nodes.
    #[error("road graph has no nodes")]
    Empty,
    /// A node id was referenced but not defined.
    #[error("unknown node {id}")]
    UnknownNode {
        /// Missing id.
        id: NodeId,
    },
    /// A node id was defined twice.
    #[error("node {id} defined more than once")]
    DuplicateNode {
        /// Repeated id.
        id: NodeId,
    },
    /// A coordinate could not be projected.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Clone, Copy)]
struct Link {
    edge: usize,
    head: usize,
}

/// Directed multigraph of drivable roads.
#[derive(Debug, Clone)]
pub struct RoadGraph {
    projection: UtmProjection,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
    outgoing: Vec<Vec<Link>>,
    tree: RTree<IndexedPoint>,
}

impl RoadGraph {
    /// Assemble a graph from already projected nodes and edges.
    ///
    /// Derived lookup structures are rebuilt; edges must only reference
    /// listed nodes.
    ///
    /// # Errors
    /// Returns [`GraphError::Empty`] without nodes,
    /// [`GraphError::DuplicateNode`] for a repeated id and
    /// [`GraphError::UnknownNode`] for a dangling edge.
    pub fn from_parts(
        projection: UtmProjection,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Self, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(GraphError::DuplicateNode { id: node.id });
            }
        }
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (i, edge) in edges.iter().enumerate() {
            let tail = *index
                .get(&edge.from)
                .ok_or(GraphError::UnknownNode { id: edge.from })?;
            let head = *index
                .get(&edge.to)
                .ok_or(GraphError::UnknownNode { id: edge.to })?;
            if let Some(arcs) = outgoing.get_mut(tail) {
                arcs.push(Link { edge: i, head });
            }
        }
        let points = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| GeomWithData::new([n.x, n.y], i))
            .collect();
        Ok(Self {
            projection,
            nodes,
            edges,
            index,
            outgoing,
            tree: RTree::bulk_load(points),
        })
    }

    /// Projection used for the planar coordinates.
    #[must_use]
    pub const fn projection(&self) -> UtmProjection {
        self.projection
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edges, counting parallel edges separately.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).and_then(|&i| self.nodes.get(i))
    }

    /// Nearest node to a geographic coordinate (`x = longitude`,
    /// `y = latitude`), measured in the projected plane.
    ///
    /// # Errors
    /// Returns [`GraphError::Projection`] when `coord` cannot be projected
    /// into the graph's zone.
    pub fn snap_node(&self, coord: Coord<f64>) -> Result<NodeId, GraphError> {
        self.nearest(coord).map(|node| node.id)
    }

    /// Nearest node to `coord` together with that node's position, projected
    /// back from the plane to longitude (`x`) and latitude (`y`).
    ///
    /// # Errors
    /// Returns [`GraphError::Projection`] when either projection fails.
    pub fn snap_geographic(&self, coord: Coord<f64>) -> Result<(NodeId, Coord<f64>), GraphError> {
        let node = self.nearest(coord)?;
        let position = self.projection.unproject(Coord {
            x: node.x,
            y: node.y,
        })?;
        Ok((node.id, position))
    }

    fn nearest(&self, coord: Coord<f64>) -> Result<&Node, GraphError> {
        let planar = self.projection.project(coord)?;
        self.tree
            .nearest_neighbor(&[planar.x, planar.y])
            .and_then(|hit| self.nodes.get(hit.data))
            .ok_or(GraphError::Empty)
    }

    /// Minimum travel-time path from `source` to `target`.
    ///
    /// Returns `Ok(None)` when `target` is unreachable. Among parallel edges
    /// the cheapest is taken.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownNode`] when either id is not in the graph.
    #[expect(clippy::float_arithmetic, reason = "Dijkstra accumulates edge costs")]
    pub fn shortest_path(
        &self,
        source: NodeId,
        target: NodeId,
    ) -> Result<Option<PathSummary>, GraphError> {
        let start = self.position(source)?;
        let goal = self.position(target)?;

        let mut best = vec![f64::INFINITY; self.nodes.len()];
        let mut via: Vec<Option<(usize, usize)>> = vec![None; self.nodes.len()];
        let mut heap = BinaryHeap::new();
        set(&mut best, start, 0.0);
        heap.push(Frontier {
            cost: 0.0,
            node: start,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == goal {
                return Ok(Some(self.summarise(goal, &via)));
            }
            if cost > best.get(node).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            let Some(arcs) = self.outgoing.get(node) else {
                continue;
            };
            for arc in arcs {
                let Some(edge) = self.edges.get(arc.edge) else {
                    continue;
                };
                let next = cost + edge.weight_seconds();
                if next < best.get(arc.head).copied().unwrap_or(f64::INFINITY) {
                    set(&mut best, arc.head, next);
                    if let Some(slot) = via.get_mut(arc.head) {
                        *slot = Some((arc.edge, node));
                    }
                    heap.push(Frontier {
                        cost: next,
                        node: arc.head,
                    });
                }
            }
        }
        Ok(None)
    }

    fn position(&self, id: NodeId) -> Result<usize, GraphError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(GraphError::UnknownNode { id })
    }

    #[expect(clippy::float_arithmetic, reason = "path totals")]
    fn summarise(&self, goal: usize, via: &[Option<(usize, usize)>]) -> PathSummary {
        let mut hops = Vec::new();
        let mut cursor = goal;
        while let Some(Some((edge, prev))) = via.get(cursor) {
            hops.push(*edge);
            cursor = *prev;
        }
        hops.reverse();

        let mut nodes = Vec::with_capacity(hops.len() + 1);
        if let Some(first) = self.nodes.get(cursor) {
            nodes.push(first.id);
        }
        let mut length_meters = 0.0;
        let mut travel_time_seconds = 0.0;
        for edge in hops.iter().filter_map(|&i| self.edges.get(i)) {
            nodes.push(edge.to);
            length_meters += edge.length_m;
            travel_time_seconds += edge.travel_time_s.unwrap_or(0.0);
        }
        PathSummary {
            nodes,
            length_meters,
            travel_time_seconds,
        }
    }
}

fn set(values: &mut [f64], at: usize, value: f64) {
    if let Some(slot) = values.get_mut(at) {
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    // Reversed so the max-heap pops the cheapest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Incrementally collects geographic nodes and edges, then projects them
/// into the UTM zone of the node centroid.
///
/// # Examples
/// ```
/// use fleetroute_core::{Edge, RoadGraphBuilder};
///
/// # fn main() -> Result<(), fleetroute_core::GraphError> {
/// let mut builder = RoadGraphBuilder::default();
/// builder.add_node(1, 33.60, -117.80).add_node(2, 33.61, -117.80);
/// builder.add_edge(Edge::new(1, 2, 1_112.0).with_speed(40.0));
/// let graph = builder.build()?;
/// assert_eq!(graph.edge_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct RoadGraphBuilder {
    nodes: Vec<(NodeId, f64, f64)>,
    edges: Vec<Edge>,
}

impl RoadGraphBuilder {
    /// Record a node at `lat`/`lon`.
    pub fn add_node(&mut self, id: NodeId, lat: f64, lon: f64) -> &mut Self {
        self.nodes.push((id, lat, lon));
        self
    }

    /// Record a directed edge.
    pub fn add_edge(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Number of nodes recorded so far.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Project every node and assemble the graph.
    ///
    /// # Errors
    /// Fails like [`RoadGraph::from_parts`], or with
    /// [`GraphError::Projection`] when a node lies outside the UTM band.
    #[expect(clippy::float_arithmetic, reason = "centroid of the node set")]
    pub fn build(self) -> Result<RoadGraph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        #[expect(
            clippy::cast_precision_loss,
            reason = "node counts stay far below 2^52"
        )]
        let count = self.nodes.len() as f64;
        let (sum_lat, sum_lon) = self
            .nodes
            .iter()
            .fold((0.0, 0.0), |(la, lo), &(_, lat, lon)| (la + lat, lo + lon));
        let projection = UtmProjection::for_coord(Coord {
            x: sum_lon / count,
            y: sum_lat / count,
        })?;

        let nodes = self
            .nodes
            .into_iter()
            .map(|(id, lat, lon)| -> Result<Node, ProjectionError> {
                let planar = projection.project(Coord { x: lon, y: lat })?;
                Ok(Node {
                    id,
                    lat,
                    lon,
                    x: planar.x,
                    y: planar.y,
                })
            })
            .collect::<Result<Vec<_>, ProjectionError>>()?;
        RoadGraph::from_parts(projection, nodes, self.edges)
    }
}

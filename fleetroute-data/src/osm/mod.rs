//! Assembly of a drivable [`RoadGraph`] from raw OSM nodes and ways.
//!
//! Both network sources feed elements into a [`RoadNetworkAssembler`]:
//! nodes in any order, ways filtered by [`is_drivable`]. [`finish`] splits
//! each way into node-to-node segments, applies one-way rules, and gives
//! every edge a speed and travel time.
//!
//! [`finish`]: RoadNetworkAssembler::finish

use std::collections::{HashMap, HashSet};

use fleetroute_core::{Edge, NetworkSourceError, NodeId, RoadGraph, RoadGraphBuilder, haversine_meters};
use geo::Coord;
use log::{debug, warn};

mod speed;
mod tags;

pub use speed::{SpeedTable, default_speed_kph};
pub use tags::{TagLookup, TravelDirection, is_drivable, parse_maxspeed, travel_direction};

/// Tags of a way, keyed by OSM tag name.
pub type WayTags = HashMap<String, String>;

#[derive(Debug)]
struct DriveWay {
    id: i64,
    refs: Vec<NodeId>,
    highway: String,
    direction: TravelDirection,
    maxspeed: Option<f64>,
}

#[derive(Debug)]
struct Segment<'a> {
    from: NodeId,
    to: NodeId,
    length_m: f64,
    way: &'a DriveWay,
}

/// Collects OSM elements and turns them into a [`RoadGraph`].
///
/// # Examples
/// ```
/// use fleetroute_data::osm::{RoadNetworkAssembler, WayTags};
///
/// # fn main() -> Result<(), fleetroute_core::NetworkSourceError> {
/// let mut assembler = RoadNetworkAssembler::default();
/// assembler.add_node(1, 33.600, -117.800);
/// assembler.add_node(2, 33.601, -117.800);
/// let tags = WayTags::from([("highway".to_owned(), "residential".to_owned())]);
/// assembler.add_way(10, vec![1, 2], &tags);
/// let graph = assembler.finish("Irvine")?;
/// assert_eq!(graph.edge_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RoadNetworkAssembler {
    nodes: HashMap<NodeId, Coord<f64>>,
    ways: Vec<DriveWay>,
    skipped_ways: usize,
}

impl RoadNetworkAssembler {
    /// Record a node position. Returns `false` for coordinates outside the
    /// WGS84 range, which are ignored.
    pub fn add_node(&mut self, id: NodeId, lat: f64, lon: f64) -> bool {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            self.nodes.insert(id, Coord { x: lon, y: lat });
        }
        valid
    }

    /// Record a way. Returns `true` when it is part of the drivable network.
    pub fn add_way<T: TagLookup + ?Sized>(&mut self, id: i64, refs: Vec<NodeId>, tags: &T) -> bool {
        if refs.len() < 2 || !is_drivable(tags) {
            self.skipped_ways += 1;
            return false;
        }
        self.ways.push(DriveWay {
            id,
            refs,
            highway: tags.tag("highway").unwrap_or_default().to_owned(),
            direction: travel_direction(tags),
            maxspeed: tags.tag("maxspeed").and_then(parse_maxspeed),
        });
        true
    }

    /// Number of drivable ways recorded so far.
    #[must_use]
    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    /// Node ids referenced by the drivable ways recorded so far.
    #[must_use]
    pub fn referenced_nodes(&self) -> HashSet<NodeId> {
        self.ways.iter().flat_map(|w| w.refs.iter().copied()).collect()
    }

    /// Build the graph.
    ///
    /// Segments whose end nodes were never seen are dropped with a warning.
    ///
    /// # Errors
    ///
    /// [`NetworkSourceError::EmptyNetwork`] when no drivable segment
    /// survives, and [`NetworkSourceError::Graph`] when graph construction
    /// fails.
    pub fn finish(self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        let (segments, missing) = self.segments();
        if missing > 0 {
            warn!("{region}: dropped {missing} way segments with unknown nodes");
        }
        if segments.is_empty() {
            return Err(NetworkSourceError::EmptyNetwork {
                region: region.to_owned(),
            });
        }
        debug!(
            "{region}: {} drivable ways, {} skipped, {} segments",
            self.ways.len(),
            self.skipped_ways,
            segments.len()
        );

        let mut speeds = SpeedTable::default();
        for segment in &segments {
            if let Some(kph) = segment.way.maxspeed {
                speeds.observe(&segment.way.highway, kph);
            }
        }

        let mut builder = RoadGraphBuilder::default();
        let mut added = HashSet::new();
        for segment in &segments {
            for id in [segment.from, segment.to] {
                if added.insert(id) {
                    if let Some(at) = self.nodes.get(&id) {
                        builder.add_node(id, at.y, at.x);
                    }
                }
            }
            let way = segment.way;
            let kph = way.maxspeed.unwrap_or_else(|| speeds.impute(&way.highway));
            let directed = match way.direction {
                TravelDirection::Forward => vec![(segment.from, segment.to)],
                TravelDirection::Reverse => vec![(segment.to, segment.from)],
                TravelDirection::Both => vec![(segment.from, segment.to), (segment.to, segment.from)],
            };
            for (from, to) in directed {
                builder.add_edge(
                    Edge::new(from, to, segment.length_m)
                        .with_speed(kph)
                        .with_highway(way.highway.clone()),
                );
            }
        }
        Ok(builder.build()?)
    }

    fn segments(&self) -> (Vec<Segment<'_>>, usize) {
        let mut segments = Vec::new();
        let mut missing = 0;
        for way in &self.ways {
            for (&from, &to) in way.refs.iter().zip(way.refs.iter().skip(1)) {
                if from == to {
                    continue;
                }
                match (self.nodes.get(&from), self.nodes.get(&to)) {
                    (Some(&a), Some(&b)) => segments.push(Segment {
                        from,
                        to,
                        length_m: haversine_meters(a, b),
                        way,
                    }),
                    _ => {
                        debug!("way {}: segment {from}->{to} references an unknown node", way.id);
                        missing += 1;
                    }
                }
            }
        }
        (segments, missing)
    }
}

//! Road network from a local OSM PBF extract.

use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use fleetroute_core::{NetworkSourceError, RoadGraph, RoadNetworkSource};
use geo::{Coord, Rect};
use log::info;
use osmpbf::{Element, ElementReader};

use crate::osm::{RoadNetworkAssembler, WayTags};

/// [`RoadNetworkSource`] reading a `.osm.pbf` file instead of downloading.
///
/// The region name is only used for logging and error messages; the extract
/// is expected to cover it. [`PbfSource::with_bounds`] crops a larger
/// extract.
///
/// # Examples
/// ```no_run
/// use fleetroute_core::RoadNetworkSource;
/// use fleetroute_data::PbfSource;
///
/// let source = PbfSource::new("extracts/socal.osm.pbf");
/// let graph = source.fetch("Irvine, California, USA")?;
/// # Ok::<(), fleetroute_core::NetworkSourceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PbfSource {
    path: Utf8PathBuf,
    bounds: Option<Rect<f64>>,
}

impl PbfSource {
    /// Source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            bounds: None,
        }
    }

    /// Keep only nodes inside `bounds` (`x = longitude`, `y = latitude`).
    #[must_use]
    pub const fn with_bounds(mut self, bounds: Rect<f64>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Extract location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn keeps(&self, lat: f64, lon: f64) -> bool {
        self.bounds.is_none_or(|b| {
            let (min, max) = (b.min(), b.max());
            (min.x..=max.x).contains(&lon) && (min.y..=max.y).contains(&lat)
        })
    }

    fn accept_node(&self, assembler: &mut RoadNetworkAssembler, id: i64, lat: f64, lon: f64) {
        if self.keeps(lat, lon) {
            assembler.add_node(id, lat, lon);
        }
    }
}

impl RoadNetworkSource for PbfSource {
    fn fetch(&self, region: &str) -> Result<RoadGraph, NetworkSourceError> {
        let file = fleetroute_fs::open_utf8_file(&self.path).map_err(|source| NetworkSourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!("reading road network for {region} from {}", self.path);
        let reader = ElementReader::new(BufReader::new(file));

        let mut assembler = RoadNetworkAssembler::default();
        reader
            .for_each(|element| match element {
                Element::Node(node) => self.accept_node(&mut assembler, node.id(), node.lat(), node.lon()),
                Element::DenseNode(node) => {
                    self.accept_node(&mut assembler, node.id(), node.lat(), node.lon());
                }
                Element::Way(way) => {
                    let tags: WayTags = way
                        .tags()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect();
                    assembler.add_way(way.id(), way.refs().collect(), &tags);
                }
                Element::Relation(_) => {}
            })
            .map_err(|err| NetworkSourceError::Parse {
                message: format!("failed to decode {}: {err}", self.path),
            })?;
        assembler.finish(region)
    }
}

/// Bounding box around `center` extending `half_size_deg` degrees each way.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "offsets in degrees")]
pub fn bounds_around(center: Coord<f64>, half_size_deg: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: center.x - half_size_deg,
            y: center.y - half_size_deg,
        },
        Coord {
            x: center.x + half_size_deg,
            y: center.y + half_size_deg,
        },
    )
}

//! Test helpers for writing stop fixtures and serving a fake road network.

use super::*;
use crate::network::{NetworkConfig, SourceBuilder};
use camino::Utf8PathBuf;
use fleetroute_core::test_support::{FailingSource, grid_graph};
use fleetroute_core::{NetworkSourceError, RoadGraph, RoadNetworkSource};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// South-west corner of the fake road grid.
pub(super) const GRID_ORIGIN: (f64, f64) = (33.600, -117.800);
/// Region name used by CLI fixtures.
pub(super) const TEST_REGION: &str = "Test Grid";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write fixture file");
}

pub(super) fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
    (dir, root)
}

/// JSON array of stop records for `(id, latitude, longitude)` triples.
pub(super) fn stops_json(stops: &[(&str, f64, f64)]) -> Vec<u8> {
    let records: Vec<serde_json::Value> = stops
        .iter()
        .map(|(id, lat, lng)| {
            serde_json::json!({
                "id": id,
                "name": format!("Stop {id}"),
                "latitude": lat,
                "longitude": lng,
            })
        })
        .collect();
    serde_json::to_vec_pretty(&records).expect("serialize stops")
}

/// Four stops on the fake grid, two at each end.
pub(super) fn grid_stops() -> Vec<u8> {
    let (lat, lng) = GRID_ORIGIN;
    stops_json(&[
        ("w1", lat, lng),
        ("w2", lat + 0.001, lng),
        ("e1", lat, lng + 0.003),
        ("e2", lat + 0.001, lng + 0.003),
    ])
}

/// Serves a 4×4 street grid and counts fetches through a shared counter.
#[derive(Debug, Clone)]
struct GridSource {
    fetches: Arc<AtomicUsize>,
}

impl RoadNetworkSource for GridSource {
    fn fetch(&self, _region: &str) -> Result<RoadGraph, NetworkSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let (lat, lng) = GRID_ORIGIN;
        Ok(grid_graph(lat, lng, 4)?)
    }
}

/// Source builder handing out fake sources instead of HTTP clients.
#[derive(Debug, Clone, Default)]
pub(super) struct FakeSourceBuilder {
    fetches: Arc<AtomicUsize>,
    unreachable: bool,
}

impl FakeSourceBuilder {
    pub(super) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub(super) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SourceBuilder for FakeSourceBuilder {
    fn build(&self, _config: &NetworkConfig) -> Result<Box<dyn RoadNetworkSource>, CliError> {
        if self.unreachable {
            return Ok(Box::new(FailingSource));
        }
        Ok(Box::new(GridSource {
            fetches: Arc::clone(&self.fetches),
        }))
    }
}

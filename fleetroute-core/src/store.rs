//! Read access to stop records, plus an in-memory R\*-tree implementation.
//!
//! The optimiser only consumes stop lists; the geographic queries here serve
//! lookup endpoints and tooling.

use std::collections::HashMap;

use geo::{Coord, Rect};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::geodesy::{EARTH_RADIUS_METERS, haversine_meters};
use crate::stop::{StopRecord, StopRecordError};

/// Source of stop records.
///
/// Coordinates use WGS84 with `x = longitude` and `y = latitude`. Queries do
/// not model regions crossing the antimeridian.
pub trait StopStore {
    /// Every stop, in insertion order.
    fn list_stops(&self) -> Vec<StopRecord>;

    /// Stops whose great-circle distance from `center` is at most
    /// `radius_meters`, nearest first, at most `limit` of them.
    #[expect(clippy::float_arithmetic, reason = "degree envelope around the circle")]
    fn stops_within_radius(&self, center: Coord<f64>, radius_meters: f64, limit: usize)
    -> Vec<StopRecord>;

    /// Stops inside `bbox`, boundary included, in insertion order, at most
    /// `limit` of them.
    fn stops_in_bbox(&self, bbox: &Rect<f64>, limit: usize) -> Vec<StopRecord>;
}

type IndexedStop = GeomWithData<[f64; 2], usize>;

/// [`StopStore`] held in memory and indexed by an R\*-tree.
#[derive(Debug, Default, Clone)]
pub struct MemoryStopStore {
    stops: Vec<StopRecord>,
    by_id: HashMap<String, usize>,
    tree: RTree<IndexedStop>,
}

impl MemoryStopStore {
    /// Build a store from validated records; later duplicates replace
    /// earlier ones.
    ///
    /// # Errors
    /// Returns the first [`StopRecordError`] raised by a record.
    pub fn from_records<I>(records: I) -> Result<Self, StopRecordError>
    where
        I: IntoIterator<Item = StopRecord>,
    {
        let mut store = Self::default();
        for record in records {
            store.upsert(record)?;
        }
        Ok(store)
    }

    /// Insert or replace the stop with the record's id. Returns `true` when
    /// an existing stop was replaced.
    ///
    /// # Errors
    /// Returns [`StopRecordError`] when the record fails validation; the
    /// store is left unchanged.
    pub fn upsert(&mut self, record: StopRecord) -> Result<bool, StopRecordError> {
        record.validate()?;
        let point = [record.longitude, record.latitude];
        if let Some(&slot) = self.by_id.get(&record.id) {
            if let Some(old) = self.stops.get_mut(slot) {
                self.tree
                    .remove(&GeomWithData::new([old.longitude, old.latitude], slot));
                *old = record;
            }
            self.tree.insert(GeomWithData::new(point, slot));
            return Ok(true);
        }
        let slot = self.stops.len();
        self.by_id.insert(record.id.clone(), slot);
        self.stops.push(record);
        self.tree.insert(GeomWithData::new(point, slot));
        Ok(false)
    }

    /// Look up a stop by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StopRecord> {
        self.by_id.get(id).and_then(|&slot| self.stops.get(slot))
    }

    /// Number of stops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    fn records_in(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &StopRecord> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope(envelope)
            .map(|hit| hit.data)
            .collect();
        slots.sort_unstable();
        slots.into_iter().filter_map(|slot| self.stops.get(slot))
    }
}

impl StopStore for MemoryStopStore {
    fn list_stops(&self) -> Vec<StopRecord> {
        self.stops.clone()
    }

    fn stops_within_radius(
        &self,
        center: Coord<f64>,
        radius_meters: f64,
        limit: usize,
    ) -> Vec<StopRecord> {
        if radius_meters.is_nan() || radius_meters < 0.0 {
            return Vec::new();
        }
        // Degree envelope that contains the whole search circle.
        let lat_span = (radius_meters / EARTH_RADIUS_METERS).to_degrees();
        let lon_span = lat_span / center.y.to_radians().cos().abs().max(1e-6);
        let envelope = AABB::from_corners(
            [center.x - lon_span, center.y - lat_span],
            [center.x + lon_span, center.y + lat_span],
        );

        let mut hits: Vec<(f64, &StopRecord)> = self
            .records_in(&envelope)
            .map(|stop| (haversine_meters(center, stop.location()), stop))
            .filter(|(d, _)| *d <= radius_meters)
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter()
            .take(limit)
            .map(|(_, stop)| stop.clone())
            .collect()
    }

    fn stops_in_bbox(&self, bbox: &Rect<f64>, limit: usize) -> Vec<StopRecord> {
        let envelope = AABB::from_corners(
            [bbox.min().x, bbox.min().y],
            [bbox.max().x, bbox.max().y],
        );
        self.records_in(&envelope).take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn record(id: &str, lat: f64, lng: f64) -> StopRecord {
        StopRecord::new(id, format!("Stop {id}"), lat, lng).expect("valid stop")
    }

    fn ids(stops: &[StopRecord]) -> Vec<&str> {
        stops.iter().map(|s| s.id.as_str()).collect()
    }

    #[fixture]
    fn store() -> MemoryStopStore {
        MemoryStopStore::from_records([
            record("campus", 33.6405, -117.8443),
            record("spectrum", 33.6490, -117.7430),
            record("harbor", 33.6000, -117.8000),
            record("downtown-la", 34.0522, -118.2437),
        ])
        .expect("valid records")
    }

    #[rstest]
    fn lists_in_insertion_order(store: MemoryStopStore) {
        assert_eq!(
            ids(&store.list_stops()),
            ["campus", "spectrum", "harbor", "downtown-la"]
        );
    }

    #[rstest]
    fn radius_results_are_nearest_first(store: MemoryStopStore) {
        let found = store.stops_within_radius(Coord { x: -117.80, y: 33.60 }, 12_000.0, 10);
        assert_eq!(ids(&found), ["harbor", "campus", "spectrum"]);
    }

    #[rstest]
    fn radius_results_respect_limit(store: MemoryStopStore) {
        let found = store.stops_within_radius(Coord { x: -117.80, y: 33.60 }, 12_000.0, 1);
        assert_eq!(ids(&found), ["harbor"]);
    }

    #[rstest]
    #[case(0.0, 1)]
    #[case(-5.0, 0)]
    #[case(f64::NAN, 0)]
    fn degenerate_radius(store: MemoryStopStore, #[case] radius: f64, #[case] expected: usize) {
        let found = store.stops_within_radius(Coord { x: -117.80, y: 33.60 }, radius, 10);
        assert_eq!(found.len(), expected);
    }

    #[rstest]
    #[case(Coord { x: -117.80, y: 33.60 })]
    #[case(Coord { x: -117.70, y: 33.70 })]
    fn bbox_includes_boundary(#[case] corner: Coord<f64>) {
        let store = MemoryStopStore::from_records([record("edge", corner.y, corner.x)]).expect("valid record");
        let bbox = Rect::new(Coord { x: -117.80, y: 33.60 }, Coord { x: -117.70, y: 33.70 });
        assert_eq!(store.stops_in_bbox(&bbox, 10).len(), 1);
    }

    #[rstest]
    fn bbox_excludes_outside(store: MemoryStopStore) {
        let bbox = Rect::new(Coord { x: -117.90, y: 33.62 }, Coord { x: -117.70, y: 33.70 });
        assert_eq!(ids(&store.stops_in_bbox(&bbox, 10)), ["campus", "spectrum"]);
    }

    #[rstest]
    fn upsert_moves_existing_stop(mut store: MemoryStopStore) {
        let replaced = store.upsert(record("harbor", 34.05, -118.24)).expect("valid record");
        assert!(replaced);
        assert_eq!(store.len(), 4);
        let near_la = store.stops_within_radius(Coord { x: -118.24, y: 34.05 }, 1_000.0, 10);
        assert_eq!(ids(&near_la), ["harbor", "downtown-la"]);
        let near_irvine = store.stops_within_radius(Coord { x: -117.80, y: 33.60 }, 100.0, 10);
        assert!(near_irvine.is_empty());
    }

    #[rstest]
    fn upsert_rejects_invalid_records(mut store: MemoryStopStore) {
        let mut bad = record("x", 0.0, 0.0);
        bad.latitude = 123.0;
        assert!(store.upsert(bad).is_err());
        assert!(store.get("x").is_none());
    }
}

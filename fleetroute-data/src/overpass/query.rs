//! Overpass QL for the drivable network of a geocoded place.

use super::types::{BoundingBox, Place};

/// Offset Overpass adds to a relation id to form its area id.
const RELATION_AREA_OFFSET: i64 = 3_600_000_000;

/// Way filter equivalent to the `drive` network type; the same rules are
/// re-applied locally by [`crate::osm::is_drivable`].
const DRIVE_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]"#,
    r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
    r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
    r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
    r#"["access"!~"private"]"#,
);

/// Where the query looks for ways.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryScope {
    /// Inside the administrative area of a boundary relation.
    Area(i64),
    /// Inside a bounding box.
    Bounds(BoundingBox),
}

impl QueryScope {
    /// Scope for a geocoded place: its area when it is a relation, else its
    /// bounding box.
    #[must_use]
    pub fn for_place(place: &Place) -> Option<Self> {
        if place.is_relation() {
            return Some(Self::Area(RELATION_AREA_OFFSET + place.osm_id));
        }
        place.bounding_box().map(Self::Bounds)
    }
}

/// Overpass QL returning drivable ways in `scope` plus their nodes.
#[must_use]
pub fn drive_network_query(scope: QueryScope, timeout_secs: u64) -> String {
    let selection = match scope {
        QueryScope::Area(area) => format!("area({area})->.region;\nway{DRIVE_FILTER}(area.region);"),
        QueryScope::Bounds(b) => format!(
            "way{DRIVE_FILTER}({},{},{},{});",
            b.south, b.west, b.north, b.east
        ),
    };
    format!("[out:json][timeout:{timeout_secs}];\n{selection}\n(._;>;);\nout;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn place(osm_type: &str) -> Place {
        Place {
            osm_type: osm_type.to_owned(),
            osm_id: 114_485,
            boundingbox: [
                "33.6".to_owned(),
                "33.7".to_owned(),
                "-117.9".to_owned(),
                "-117.7".to_owned(),
            ],
            display_name: "Irvine".to_owned(),
        }
    }

    #[rstest]
    fn relation_uses_area_id() {
        assert_eq!(
            QueryScope::for_place(&place("relation")),
            Some(QueryScope::Area(3_600_114_485))
        );
    }

    #[rstest]
    #[case("way")]
    #[case("node")]
    fn other_places_use_bounds(#[case] osm_type: &str) {
        let scope = QueryScope::for_place(&place(osm_type));
        assert!(matches!(scope, Some(QueryScope::Bounds(b)) if (b.west + 117.9).abs() < 1e-9));
    }

    #[rstest]
    fn area_query_shape() {
        let query = drive_network_query(QueryScope::Area(3_600_000_001), 180);
        assert!(query.starts_with("[out:json][timeout:180];"));
        assert!(query.contains("area(3600000001)->.region;"));
        assert!(query.contains("(area.region);"));
        assert!(query.contains(r#"["motorcar"!~"no"]"#));
        assert!(query.ends_with("(._;>;);\nout;"));
    }

    #[rstest]
    fn bounds_query_orders_south_west_north_east() {
        let bounds = BoundingBox {
            south: 1.0,
            west: 2.0,
            north: 3.0,
            east: 4.0,
        };
        let query = drive_network_query(QueryScope::Bounds(bounds), 60);
        assert!(query.contains("](1,2,3,4);"), "{query}");
    }
}

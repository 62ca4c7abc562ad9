//! Response types for the Nominatim search and Overpass interpreter APIs.
//!
//! See: <https://nominatim.org/release-docs/latest/api/Search/> and
//! <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL#JSON>

use serde::Deserialize;

use crate::osm::WayTags;

/// One Nominatim search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    /// `node`, `way` or `relation`.
    pub osm_type: String,
    /// OSM id of the matched element.
    pub osm_id: i64,
    /// `[south, north, west, east]` in degrees, as strings.
    pub boundingbox: [String; 4],
    /// Human-readable name of the match.
    #[serde(default)]
    pub display_name: String,
}

/// Parsed `[south, west, north, east]` bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern latitude.
    pub south: f64,
    /// Western longitude.
    pub west: f64,
    /// Northern latitude.
    pub north: f64,
    /// Eastern longitude.
    pub east: f64,
}

impl Place {
    /// Whether the match is a boundary relation usable as an Overpass area.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.osm_type == "relation"
    }

    /// The bounding box, if all four values parse.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let [south, north, west, east] = &self.boundingbox;
        Some(BoundingBox {
            south: south.trim().parse().ok()?,
            west: west.trim().parse().ok()?,
            north: north.trim().parse().ok()?,
            east: east.trim().parse().ok()?,
        })
    }
}

/// Overpass JSON output.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    /// Returned elements, nodes and ways interleaved.
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Runtime remark, set when the query hit a limit.
    #[serde(default)]
    pub remark: Option<String>,
}

/// One element of an Overpass response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverpassElement {
    /// A positioned node.
    Node {
        /// OSM id.
        id: i64,
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
    /// A way with its node references.
    Way {
        /// OSM id.
        id: i64,
        /// Node ids in drawing order.
        #[serde(default)]
        nodes: Vec<i64>,
        /// Way tags.
        #[serde(default)]
        tags: WayTags,
    },
    /// Relations, areas and anything else the query returned.
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialise_place() {
        let json = r#"[{
            "place_id": 1,
            "osm_type": "relation",
            "osm_id": 114485,
            "boundingbox": ["33.6096", "33.7518", "-117.8749", "-117.6911"],
            "lat": "33.6856",
            "lon": "-117.8259",
            "display_name": "Irvine, Orange County, California, United States"
        }]"#;

        let places: Vec<Place> = serde_json::from_str(json).expect("should deserialise");

        assert_eq!(places.len(), 1);
        assert!(places[0].is_relation());
        assert_eq!(
            places[0].bounding_box(),
            Some(BoundingBox {
                south: 33.6096,
                west: -117.8749,
                north: 33.7518,
                east: -117.6911,
            })
        );
    }

    #[test]
    fn malformed_bounding_box_is_none() {
        let place = Place {
            osm_type: "way".to_owned(),
            osm_id: 1,
            boundingbox: ["a".to_owned(), "1".to_owned(), "2".to_owned(), "3".to_owned()],
            display_name: String::new(),
        };
        assert_eq!(place.bounding_box(), None);
    }

    #[test]
    fn deserialise_elements() {
        let json = r#"{
            "version": 0.6,
            "elements": [
                {"type": "node", "id": 1, "lat": 33.6, "lon": -117.8},
                {"type": "way", "id": 10, "nodes": [1, 2], "tags": {"highway": "residential"}},
                {"type": "relation", "id": 100, "members": []}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(json).expect("should deserialise");

        assert_eq!(response.elements.len(), 3);
        assert!(matches!(response.elements[0], OverpassElement::Node { id: 1, .. }));
        match &response.elements[1] {
            OverpassElement::Way { nodes, tags, .. } => {
                assert_eq!(nodes, &[1, 2]);
                assert_eq!(tags.get("highway").map(String::as_str), Some("residential"));
            }
            other => panic!("expected way, got {other:?}"),
        }
        assert!(matches!(response.elements[2], OverpassElement::Other));
    }
}

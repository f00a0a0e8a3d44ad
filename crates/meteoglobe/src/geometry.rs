//! GeoJSON boundary parsing.
//!
//! The boundary service returns GeoJSON-shaped documents: a
//! `FeatureCollection`, a single `Feature`, or a bare `Polygon` /
//! `MultiPolygon` geometry. Parsing is tolerant: a malformed feature is
//! logged and skipped rather than failing the whole document.

use serde_json::Value;

use crate::error::{Error, Result};

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, [-180, 180].
    pub lon: f64,
}

/// Parsed national boundary: one or more closed polygon rings.
#[derive(Debug, Clone, Default)]
pub struct BoundaryGeometry {
    /// Closed rings; the first and last point of each ring coincide
    /// per the GeoJSON spec, but renderers should not rely on it.
    pub rings: Vec<Vec<GeoPoint>>,
}

impl BoundaryGeometry {
    /// Returns true if no ring survived parsing.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

/// Parse a GeoJSON document into boundary rings.
///
/// Returns `Error::Geometry` only when the document yields no usable ring
/// at all; individually malformed features are skipped.
pub fn parse_geojson(doc: &Value) -> Result<BoundaryGeometry> {
    let mut geometry = BoundaryGeometry::default();

    match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = doc
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Geometry {
                    detail: "FeatureCollection without features array".to_string(),
                })?;
            for feature in features {
                if let Some(inner) = feature.get("geometry") {
                    collect_rings(inner, &mut geometry.rings);
                } else {
                    tracing::warn!("skipping feature without geometry");
                }
            }
        }
        Some("Feature") => {
            if let Some(inner) = doc.get("geometry") {
                collect_rings(inner, &mut geometry.rings);
            }
        }
        Some(_) => collect_rings(doc, &mut geometry.rings),
        None => {
            return Err(Error::Geometry {
                detail: "document has no type field".to_string(),
            });
        }
    }

    if geometry.is_empty() {
        return Err(Error::Geometry {
            detail: "no usable polygon rings in document".to_string(),
        });
    }
    Ok(geometry)
}

/// Append the rings of a Polygon or MultiPolygon geometry.
///
/// Unknown geometry types and rings with fewer than three points are skipped.
fn collect_rings(geometry: &Value, out: &mut Vec<Vec<GeoPoint>>) {
    let coordinates = geometry.get("coordinates");
    match (geometry.get("type").and_then(Value::as_str), coordinates) {
        (Some("Polygon"), Some(coords)) => collect_polygon(coords, out),
        (Some("MultiPolygon"), Some(coords)) => {
            for polygon in coords.as_array().into_iter().flatten() {
                collect_polygon(polygon, out);
            }
        }
        (ty, _) => {
            tracing::warn!("skipping unsupported geometry: {:?}", ty);
        }
    }
}

fn collect_polygon(polygon: &Value, out: &mut Vec<Vec<GeoPoint>>) {
    for ring in polygon.as_array().into_iter().flatten() {
        let Some(positions) = ring.as_array() else {
            continue;
        };
        let points: Vec<GeoPoint> = positions.iter().filter_map(parse_position).collect();
        if points.len() >= 3 {
            out.push(points);
        } else {
            tracing::warn!("skipping degenerate ring with {} points", points.len());
        }
    }
}

/// GeoJSON positions are [lon, lat, ...optional elevation].
fn parse_position(position: &Value) -> Option<GeoPoint> {
    let coords = position.as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some(GeoPoint { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_polygon_feature() {
        let doc = json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
            }
        });
        let geometry = parse_geojson(&doc).unwrap();
        assert_eq!(geometry.rings.len(), 1);
        assert_eq!(geometry.rings[0].len(), 4);
        // Positions are [lon, lat].
        assert_eq!(geometry.rings[0][1], GeoPoint { lat: 0.0, lon: 1.0 });
    }

    #[test]
    fn test_parse_multipolygon_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]],
                        [[[10.0, 10.0], [11.0, 10.0], [11.0, 11.0]]]
                    ]
                }
            }]
        });
        let geometry = parse_geojson(&doc).unwrap();
        assert_eq!(geometry.rings.len(), 2);
    }

    #[test]
    fn test_malformed_feature_is_skipped() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature" },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]
                    }
                }
            ]
        });
        let geometry = parse_geojson(&doc).unwrap();
        assert_eq!(geometry.rings.len(), 1);
    }

    #[test]
    fn test_degenerate_ring_is_skipped() {
        let doc = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 1.0]]]
        });
        assert!(parse_geojson(&doc).is_err());
    }

    #[test]
    fn test_missing_type_is_error() {
        let doc = json!({ "features": [] });
        let err = parse_geojson(&doc).unwrap_err();
        assert!(err.to_string().contains("no type field"));
    }

    #[test]
    fn test_empty_collection_is_error() {
        let doc = json!({ "type": "FeatureCollection", "features": [] });
        assert!(parse_geojson(&doc).is_err());
    }
}

//! Hand-rolled GeoJSON wire types.
//!
//! Only the geometry kinds the wizards produce (Point, Polygon, MultiPolygon)
//! are supported; everything else is rejected on input. A third coordinate
//! (altitude) is accepted and dropped.

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AoiError, Result};
use crate::model::{Feature, PolyType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeoJsonGeometry {
    Point(Vec<f64>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl GeoJsonGeometry {
    pub fn from_geo(geometry: &Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Point(p) => Ok(GeoJsonGeometry::Point(vec![p.x(), p.y()])),
            Geometry::Polygon(p) => Ok(GeoJsonGeometry::Polygon(polygon_coords(p))),
            Geometry::MultiPolygon(mp) => Ok(GeoJsonGeometry::MultiPolygon(
                mp.0.iter().map(polygon_coords).collect(),
            )),
            other => Err(AoiError::InvalidGeometry(format!(
                "unsupported geometry type: {other:?}"
            ))),
        }
    }

    pub fn to_geo(&self) -> Result<Geometry<f64>> {
        match self {
            GeoJsonGeometry::Point(pos) => Ok(Geometry::Point(point_from(pos)?)),
            GeoJsonGeometry::Polygon(rings) => Ok(Geometry::Polygon(polygon_from(rings)?)),
            GeoJsonGeometry::MultiPolygon(polys) => {
                let parsed: Result<Vec<Polygon<f64>>> = polys.iter().map(|rings| polygon_from(rings)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(parsed?)))
            }
        }
    }
}

fn polygon_coords(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

fn point_from(pos: &[f64]) -> Result<Point<f64>> {
    if pos.len() < 2 {
        return Err(AoiError::InvalidGeometry(
            "point position needs at least two coordinates".into(),
        ));
    }
    Ok(Point::new(pos[0], pos[1]))
}

fn ring_from(ring: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords: Result<Vec<Coord<f64>>> = ring
        .iter()
        .map(|pos| point_from(pos).map(|p| Coord { x: p.x(), y: p.y() }))
        .collect();
    Ok(LineString::new(coords?))
}

fn polygon_from(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut iter = rings.iter();
    let exterior = iter
        .next()
        .ok_or_else(|| AoiError::InvalidGeometry("polygon has no rings".into()))?;
    let interiors: Result<Vec<LineString<f64>>> = iter.map(|r| ring_from(r)).collect();
    Ok(Polygon::new(ring_from(exterior)?, interiors?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub geometry: GeoJsonGeometry,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl GeoJsonFeature {
    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let mut properties = Map::new();
        properties.insert("id".into(), Value::String(feature.id.clone()));
        properties.insert("name".into(), Value::String(feature.name.clone()));
        properties.insert(
            "poly_type".into(),
            Value::String(feature.poly_type.as_str().to_string()),
        );
        for (key, value) in &feature.extra {
            properties.insert(key.clone(), value.clone());
        }
        Ok(Self {
            kind: feature_type(),
            properties,
            geometry: GeoJsonGeometry::from_geo(&feature.geometry)?,
        })
    }

    /// Parse into a domain feature. Unknown properties are preserved in
    /// `extra`; a missing `poly_type` defaults to `core`.
    pub fn to_feature(&self) -> Result<Feature> {
        let geometry = self.geometry.to_geo()?;
        let id = self.string_property("id").unwrap_or_default();
        let name = self.string_property("name").unwrap_or_default();
        let poly_type = self
            .string_property("poly_type")
            .and_then(|s| PolyType::parse(&s))
            .unwrap_or(PolyType::Core);

        let mut feature = Feature::new(id, name, poly_type, geometry);
        for (key, value) in &self.properties {
            if !matches!(key.as_str(), "id" | "name" | "poly_type") {
                feature.extra.insert(key.clone(), value.clone());
            }
        }
        Ok(feature)
    }

    fn string_property(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonFeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub kind: String,
    pub features: Vec<GeoJsonFeature>,
}

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

impl GeoJsonFeatureCollection {
    pub fn from_features(features: &[Feature]) -> Result<Self> {
        let features: Result<Vec<GeoJsonFeature>> =
            features.iter().map(GeoJsonFeature::from_feature).collect();
        Ok(Self {
            kind: collection_type(),
            features: features?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_geometry_roundtrip() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let wire = GeoJsonGeometry::from_geo(&Geometry::Polygon(poly.clone())).unwrap();
        let back = wire.to_geo().unwrap();
        assert_eq!(back, Geometry::Polygon(poly));
    }

    #[test]
    fn test_point_altitude_ignored() {
        let wire: GeoJsonGeometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[8.5,47.4,512.0]}"#).unwrap();
        let geo = wire.to_geo().unwrap();
        assert_eq!(geo, Geometry::Point(Point::new(8.5, 47.4)));
    }

    #[test]
    fn test_unsupported_geometry_rejected() {
        let result: std::result::Result<GeoJsonGeometry, _> =
            serde_json::from_str(r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_feature_properties_preserved() {
        let json = r#"{
            "type": "Feature",
            "properties": {"id": "AOI-7", "name": "x", "poly_type": "buffer", "radius_m": 300},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        }"#;
        let wire: GeoJsonFeature = serde_json::from_str(json).unwrap();
        let feature = wire.to_feature().unwrap();
        assert_eq!(feature.id, "AOI-7");
        assert_eq!(feature.poly_type, PolyType::Buffer);
        assert_eq!(feature.extra.get("radius_m"), Some(&Value::from(300)));

        let back = GeoJsonFeature::from_feature(&feature).unwrap();
        assert_eq!(back.properties.get("radius_m"), Some(&Value::from(300)));
    }
}

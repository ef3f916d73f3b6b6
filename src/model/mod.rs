//! Core data models for AOI features and projects.

pub mod geojson;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use geojson::{GeoJsonFeature, GeoJsonFeatureCollection, GeoJsonGeometry};

/// Role of a feature within an AOI project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolyType {
    /// The polygon visits are counted against.
    Core,
    /// A concentric buffer around a reference geometry.
    Buffer,
    /// A reference point, used for preview display only.
    Center,
    /// Surrounding administrative context (sibling regions/municipalities).
    Periphery,
}

impl PolyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolyType::Core => "core",
            PolyType::Buffer => "buffer",
            PolyType::Center => "center",
            PolyType::Periphery => "periphery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "core" => Some(PolyType::Core),
            "buffer" => Some(PolyType::Buffer),
            "center" => Some(PolyType::Center),
            "periphery" => Some(PolyType::Periphery),
            _ => None,
        }
    }
}

/// A geometry plus the properties every core-produced feature carries.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub poly_type: PolyType,
    pub geometry: Geometry<f64>,
    /// Additional properties carried through to the GeoJSON output.
    pub extra: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        poly_type: PolyType,
        geometry: Geometry<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            poly_type,
            geometry,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A generated AOI project: validated FeatureCollection, filename, and count.
///
/// Immutable once generated; edits produce a new project rather than a patch.
#[derive(Debug, Clone, Serialize)]
pub struct AoiProject {
    pub geojson: GeoJsonFeatureCollection,
    pub filename: String,
    pub feature_count: usize,
}

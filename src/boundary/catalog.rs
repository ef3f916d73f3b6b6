//! Read-only boundary catalog with R-tree point-in-country lookup.

use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use hashbrown::HashMap;
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use crate::error::{AoiError, Result};

/// A single country boundary with metadata.
#[derive(Debug, Clone)]
pub struct CountryBoundary {
    pub code: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Wrapper for R-tree indexing of country boundaries. `seq` is the feature's
/// position in the dataset's stored order, used as the border tie-break.
#[derive(Clone)]
struct IndexedCountry {
    boundary: Arc<CountryBoundary>,
    seq: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedCountry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One administrative region (state/district/province).
#[derive(Debug, Clone)]
pub struct Region {
    pub code: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
pub struct Municipality {
    pub name: String,
    pub region_code: String,
    pub geometry: MultiPolygon<f64>,
}

/// Region and municipality layers for one country.
#[derive(Debug, Clone)]
pub struct CountryLayers {
    pub name: String,
    regions: Vec<Region>,
    municipalities: Vec<Municipality>,
}

impl CountryLayers {
    pub fn new(name: String, mut regions: Vec<Region>, municipalities: Vec<Municipality>) -> Self {
        // Pickers list regions by their administrative code.
        regions.sort_by(|a, b| a.code.cmp(&b.code));
        Self {
            name,
            regions,
            municipalities,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, code: &str) -> Option<&Region> {
        let wanted = normalize(code);
        self.regions.iter().find(|r| normalize(&r.code) == wanted)
    }

    /// Municipalities of one region, alphabetically by name.
    pub fn municipalities_in(&self, region_code: &str) -> Vec<&Municipality> {
        let wanted = normalize(region_code);
        let mut list: Vec<&Municipality> = self
            .municipalities
            .iter()
            .filter(|m| normalize(&m.region_code) == wanted)
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

/// Normalize codes/names for comparison.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Process-wide, read-only boundary data. Constructed once at startup and
/// injected as a dependency; never reloaded during request handling.
pub struct BoundaryCatalog {
    tree: RTree<IndexedCountry>,
    countries: Vec<Arc<CountryBoundary>>,
    layers: HashMap<String, CountryLayers>,
}

impl BoundaryCatalog {
    pub fn new(countries: Vec<CountryBoundary>, layers: HashMap<String, CountryLayers>) -> Self {
        let countries: Vec<Arc<CountryBoundary>> = countries.into_iter().map(Arc::new).collect();
        let indexed: Vec<IndexedCountry> = countries
            .iter()
            .enumerate()
            .filter_map(|(seq, boundary)| {
                boundary.geometry.bounding_rect().map(|rect| IndexedCountry {
                    boundary: Arc::clone(boundary),
                    seq,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        let tree = RTree::bulk_load(indexed);

        info!(
            "boundary catalog built: {} countries, layers for {}",
            countries.len(),
            layers.len()
        );

        Self {
            tree,
            countries,
            layers,
        }
    }

    /// Which country contains the point, boundary inclusive. A point exactly
    /// on a shared border resolves to the first feature in the dataset's
    /// stored order - deterministic but arbitrary.
    pub fn country_containing(&self, point: Point<f64>) -> Option<&CountryBoundary> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|ic| ic.boundary.geometry.intersects(&point))
            .min_by_key(|ic| ic.seq)
            .map(|ic| ic.boundary.as_ref())
    }

    pub fn countries(&self) -> impl Iterator<Item = &CountryBoundary> {
        self.countries.iter().map(|c| c.as_ref())
    }

    /// Countries that have region/municipality layers loaded, by code.
    pub fn layer_countries(&self) -> Vec<(&str, &str)> {
        let mut list: Vec<(&str, &str)> = self
            .layers
            .iter()
            .map(|(code, layers)| (code.as_str(), layers.name.as_str()))
            .collect();
        list.sort_by_key(|(code, _)| *code);
        list
    }

    pub fn layers(&self, country_code: &str) -> Result<&CountryLayers> {
        self.layers
            .get(&country_code.to_uppercase())
            .ok_or_else(|| AoiError::UnknownCountry(country_code.to_string()))
    }

    /// All regions for a country, ordered by administrative code.
    pub fn regions_of(&self, country_code: &str) -> Result<&[Region]> {
        Ok(self.layers(country_code)?.regions())
    }

    /// Municipality names within one region, alphabetically.
    pub fn municipalities_of(&self, country_code: &str, region_code: &str) -> Result<Vec<&str>> {
        let layers = self.layers(country_code)?;
        let region = layers
            .region(region_code)
            .ok_or_else(|| AoiError::UnknownRegion {
                country: country_code.to_uppercase(),
                region: region_code.to_string(),
            })?;
        Ok(layers
            .municipalities_in(&region.code)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ]])
    }

    fn test_catalog() -> BoundaryCatalog {
        let countries = vec![
            CountryBoundary {
                code: "AA".into(),
                name: "Alpha".into(),
                geometry: square(0.0, 0.0, 10.0, 10.0),
            },
            CountryBoundary {
                code: "BB".into(),
                name: "Beta".into(),
                geometry: square(10.0, 0.0, 20.0, 10.0),
            },
        ];
        let mut layers = HashMap::new();
        layers.insert(
            "AA".to_string(),
            CountryLayers::new(
                "Alpha".into(),
                vec![
                    Region {
                        code: "02".into(),
                        name: "South".into(),
                        geometry: square(0.0, 0.0, 10.0, 5.0),
                    },
                    Region {
                        code: "01".into(),
                        name: "North".into(),
                        geometry: square(0.0, 5.0, 10.0, 10.0),
                    },
                ],
                vec![
                    Municipality {
                        name: "Zebra Town".into(),
                        region_code: "01".into(),
                        geometry: square(0.0, 5.0, 5.0, 10.0),
                    },
                    Municipality {
                        name: "Acacia City".into(),
                        region_code: "01".into(),
                        geometry: square(5.0, 5.0, 10.0, 10.0),
                    },
                ],
            ),
        );
        BoundaryCatalog::new(countries, layers)
    }

    #[test]
    fn test_country_containing() {
        let catalog = test_catalog();
        let hit = catalog.country_containing(Point::new(5.0, 5.0)).unwrap();
        assert_eq!(hit.code, "AA");
        let hit = catalog.country_containing(Point::new(15.0, 5.0)).unwrap();
        assert_eq!(hit.code, "BB");
        assert!(catalog.country_containing(Point::new(50.0, 50.0)).is_none());
    }

    #[test]
    fn test_border_tie_break_is_stored_order() {
        let catalog = test_catalog();
        // x = 10 sits on the shared border of both countries.
        let hit = catalog.country_containing(Point::new(10.0, 5.0)).unwrap();
        assert_eq!(hit.code, "AA");
    }

    #[test]
    fn test_regions_ordered_by_code() {
        let catalog = test_catalog();
        let regions = catalog.regions_of("AA").unwrap();
        let codes: Vec<&str> = regions.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["01", "02"]);
    }

    #[test]
    fn test_municipalities_alphabetical() {
        let catalog = test_catalog();
        let names = catalog.municipalities_of("AA", "01").unwrap();
        assert_eq!(names, vec!["Acacia City", "Zebra Town"]);
    }

    #[test]
    fn test_unknown_country_and_region() {
        let catalog = test_catalog();
        assert!(matches!(
            catalog.regions_of("XX"),
            Err(AoiError::UnknownCountry(_))
        ));
        assert!(matches!(
            catalog.municipalities_of("AA", "99"),
            Err(AoiError::UnknownRegion { .. })
        ));
    }
}

//! Boundary dataset loading at process startup.
//!
//! One GeoJSON file per country per administrative level, named in the
//! config. A country whose files are missing or corrupt is skipped with a
//! warning; the remaining countries stay usable.

use anyhow::{Context, Result};
use geo::{Geometry, MultiPolygon};
use hashbrown::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, CountryConfig};
use crate::model::geojson::{GeoJsonFeature, GeoJsonFeatureCollection};

use super::catalog::{BoundaryCatalog, CountryBoundary, CountryLayers, Municipality, Region};

pub fn load_catalog(config: &Config) -> Result<BoundaryCatalog> {
    let data_dir = &config.global.data_dir;

    let countries_path = data_dir.join(&config.global.countries_file);
    let countries = load_country_boundaries(&countries_path)
        .with_context(|| format!("loading country boundaries from {countries_path:?}"))?;

    let mut layers = HashMap::new();
    for country in &config.countries {
        match load_country_layers(data_dir, country) {
            Ok(loaded) => {
                layers.insert(country.code.to_uppercase(), loaded);
            }
            Err(e) => {
                warn!(
                    country = %country.code,
                    error = %e,
                    "boundary data failed to load, country disabled"
                );
            }
        }
    }

    if layers.is_empty() && !config.countries.is_empty() {
        anyhow::bail!("boundary data failed to load for every configured country");
    }

    Ok(BoundaryCatalog::new(countries, layers))
}

fn read_collection(path: &Path) -> Result<GeoJsonFeatureCollection> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let collection: GeoJsonFeatureCollection =
        serde_json::from_str(&content).with_context(|| format!("parsing {path:?}"))?;
    Ok(collection)
}

/// World country layer. Feature order in the file is the tie-break order.
fn load_country_boundaries(path: &Path) -> Result<Vec<CountryBoundary>> {
    let collection = read_collection(path)?;
    let mut boundaries = Vec::new();
    for (i, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = multipolygon_of(feature) else {
            continue;
        };
        let name = string_prop(feature, "name").unwrap_or_else(|| format!("country-{i}"));
        let code = string_prop(feature, "code")
            .or_else(|| string_prop(feature, "iso_a2"))
            .unwrap_or_else(|| name.clone());
        boundaries.push(CountryBoundary {
            code,
            name,
            geometry,
        });
    }
    info!("loaded {} country boundaries", boundaries.len());
    Ok(boundaries)
}

fn load_country_layers(data_dir: &Path, config: &CountryConfig) -> Result<CountryLayers> {
    let regions_path = data_dir.join(&config.regions_file);
    let regions_fc = read_collection(&regions_path)?;

    let mut regions = Vec::new();
    for feature in &regions_fc.features {
        let Some(geometry) = multipolygon_of(feature) else {
            continue;
        };
        let Some(name) = string_prop(feature, &config.region_name_key) else {
            continue;
        };
        let code = string_prop(feature, &config.region_code_key).unwrap_or_else(|| name.clone());
        regions.push(Region {
            code,
            name,
            geometry,
        });
    }
    if regions.is_empty() {
        anyhow::bail!("no usable region features in {regions_path:?}");
    }

    let municipalities_path = data_dir.join(&config.municipalities_file);
    let municipalities_fc = read_collection(&municipalities_path)?;

    let mut municipalities = Vec::new();
    for feature in &municipalities_fc.features {
        let Some(geometry) = multipolygon_of(feature) else {
            continue;
        };
        let Some(name) = string_prop(feature, &config.municipality_name_key) else {
            continue;
        };
        let Some(region_code) = string_prop(feature, &config.municipality_region_key) else {
            continue;
        };
        municipalities.push(Municipality {
            name,
            region_code,
            geometry,
        });
    }
    if municipalities.is_empty() {
        anyhow::bail!("no usable municipality features in {municipalities_path:?}");
    }

    info!(
        country = %config.code,
        regions = regions.len(),
        municipalities = municipalities.len(),
        "boundary layers loaded"
    );

    Ok(CountryLayers::new(
        config.name.clone(),
        regions,
        municipalities,
    ))
}

fn multipolygon_of(feature: &GeoJsonFeature) -> Option<MultiPolygon<f64>> {
    match feature.geometry.to_geo().ok()? {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

fn string_prop(feature: &GeoJsonFeature, key: &str) -> Option<String> {
    feature
        .properties
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use std::io::Write;

    fn write_geojson(dir: &Path, name: &str, body: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"code": "AA", "name": "Alpha"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
        }]
    }"#;

    const REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"code": "01", "name": "North"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,5],[10,5],[10,10],[0,10],[0,5]]]}
        }]
    }"#;

    const MUNICIPALITIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "Acacia City", "region": "01"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,5],[5,5],[5,10],[0,10],[0,5]]]}
        }]
    }"#;

    fn config_for(dir: &Path, countries: Vec<CountryConfig>) -> Config {
        Config {
            global: GlobalConfig {
                listen: "127.0.0.1:0".into(),
                data_dir: dir.to_path_buf(),
                countries_file: "countries.geojson".into(),
                node_set_ttl_secs: 60,
            },
            countries,
        }
    }

    fn country_config(code: &str, regions_file: &str) -> CountryConfig {
        CountryConfig {
            code: code.into(),
            name: "Alpha".into(),
            regions_file: regions_file.into(),
            municipalities_file: "municipalities.geojson".into(),
            region_name_key: "name".into(),
            region_code_key: "code".into(),
            municipality_name_key: "name".into(),
            municipality_region_key: "region".into(),
        }
    }

    #[test]
    fn test_load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        write_geojson(dir.path(), "countries.geojson", COUNTRIES);
        write_geojson(dir.path(), "regions.geojson", REGIONS);
        write_geojson(dir.path(), "municipalities.geojson", MUNICIPALITIES);

        let config = config_for(dir.path(), vec![country_config("aa", "regions.geojson")]);
        let catalog = load_catalog(&config).unwrap();

        assert_eq!(catalog.regions_of("AA").unwrap().len(), 1);
        assert_eq!(
            catalog.municipalities_of("aa", "01").unwrap(),
            vec!["Acacia City"]
        );
    }

    #[test]
    fn test_broken_country_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_geojson(dir.path(), "countries.geojson", COUNTRIES);
        write_geojson(dir.path(), "regions.geojson", REGIONS);
        write_geojson(dir.path(), "municipalities.geojson", MUNICIPALITIES);

        let config = config_for(
            dir.path(),
            vec![
                country_config("AA", "regions.geojson"),
                country_config("BB", "missing.geojson"),
            ],
        );
        let catalog = load_catalog(&config).unwrap();

        assert!(catalog.regions_of("AA").is_ok());
        assert!(catalog.regions_of("BB").is_err());
    }

    #[test]
    fn test_all_countries_broken_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_geojson(dir.path(), "countries.geojson", COUNTRIES);

        let config = config_for(dir.path(), vec![country_config("AA", "missing.geojson")]);
        assert!(load_catalog(&config).is_err());
    }
}

//! AOI project assembly: validation, ID uniqueness, filenames.

use chrono::Utc;
use geo::Geometry;
use hashbrown::HashSet;
use serde_json::Value;
use tracing::warn;

use crate::boundary::{normalize, BoundaryCatalog};
use crate::error::{AoiError, Result};
use crate::geometry::validate_geometry;
use crate::model::{AoiProject, Feature, GeoJsonFeatureCollection, PolyType};

/// Combine features into one validated FeatureCollection with globally
/// unique ids.
///
/// Every feature geometry is validated up front; the first invalid one fails
/// the whole assembly, naming the offender. Features without a stable id get
/// sequential `AOI-{n}` ids in input order; duplicate input ids are
/// renumbered deterministically and logged rather than rejected.
pub fn assemble(
    features: Vec<Feature>,
    country_code: &str,
    region_code: Option<&str>,
    city_name: &str,
) -> Result<AoiProject> {
    if features.is_empty() {
        return Err(AoiError::InvalidGeometry("project has no features".into()));
    }

    for feature in &features {
        validate_geometry(&feature.geometry).map_err(|reason| AoiError::InvalidFeature {
            id: feature.id.clone(),
            reason,
        })?;
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(features.len());
    let mut next_serial = 1usize;
    let mut assembled = Vec::with_capacity(features.len());

    for mut feature in features {
        let stable = !feature.id.is_empty() && !seen.contains(&feature.id);
        if !stable {
            if !feature.id.is_empty() {
                warn!(id = %feature.id, "duplicate feature id in input, renumbering");
            }
            feature.id = loop {
                let candidate = format!("AOI-{next_serial}");
                next_serial += 1;
                if !seen.contains(&candidate) {
                    break candidate;
                }
            };
        }
        seen.insert(feature.id.clone());
        feature
            .extra
            .insert("polygon_id".into(), Value::String(feature.id.clone()));
        assembled.push(feature);
    }

    let filename = project_filename(country_code, region_code, city_name);
    let geojson = GeoJsonFeatureCollection::from_features(&assembled)?;

    Ok(AoiProject {
        feature_count: assembled.len(),
        filename,
        geojson,
    })
}

/// Replace a feature's geometry after a hand edit, keeping its properties.
pub fn merge_edited_polygon(original: &Feature, edited: Geometry<f64>) -> Result<Feature> {
    validate_geometry(&edited).map_err(AoiError::InvalidGeometry)?;
    let mut feature = original.clone();
    feature.geometry = edited;
    Ok(feature)
}

/// Build the full administrative project for a municipality: the selected
/// municipality as core, its sibling municipalities and the country's other
/// regions as periphery.
pub fn generate_project(
    catalog: &BoundaryCatalog,
    country_code: &str,
    region_code: &str,
    city_name: &str,
) -> Result<AoiProject> {
    let layers = catalog.layers(country_code)?;
    let region = layers
        .region(region_code)
        .ok_or_else(|| AoiError::UnknownRegion {
            country: country_code.to_uppercase(),
            region: region_code.to_string(),
        })?;

    let mut features = Vec::new();

    for (i, other) in layers
        .regions()
        .iter()
        .filter(|r| r.code != region.code)
        .enumerate()
    {
        features.push(Feature::new(
            format!("PRO-{i}"),
            other.name.clone(),
            PolyType::Periphery,
            Geometry::MultiPolygon(other.geometry.clone()),
        ));
    }

    let wanted = normalize(city_name);
    let mut core = None;
    let mut mun_serial = 0usize;
    for municipality in layers.municipalities_in(&region.code) {
        if core.is_none() && normalize(&municipality.name) == wanted {
            core = Some(Feature::new(
                "AOI-1",
                municipality.name.clone(),
                PolyType::Core,
                Geometry::MultiPolygon(municipality.geometry.clone()),
            ));
        } else {
            features.push(Feature::new(
                format!("MUN-{mun_serial}"),
                municipality.name.clone(),
                PolyType::Periphery,
                Geometry::MultiPolygon(municipality.geometry.clone()),
            ));
            mun_serial += 1;
        }
    }

    let core = core.ok_or_else(|| AoiError::UnknownMunicipality {
        region: region.name.clone(),
        city: city_name.to_string(),
    })?;
    features.push(core);

    assemble(features, country_code, Some(region_code), city_name)
}

/// `{country}_{region}_{city}_{timestamp}_aoi.geojson`, slug-safe.
pub fn project_filename(country_code: &str, region_code: Option<&str>, city_name: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let mut parts: Vec<String> = Vec::new();
    parts.push(slugify(country_code));
    if let Some(region) = region_code {
        let slug = slugify(region);
        if !slug.is_empty() {
            parts.push(slug);
        }
    }
    parts.push(slugify(city_name));
    parts.retain(|p| !p.is_empty());
    format!("{}_{timestamp}_aoi.geojson", parts.join("_"))
}

/// Lowercase, spaces to underscores, everything non-alphanumeric stripped.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sep = true;
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if (ch.is_whitespace() || ch == '_' || ch == '-' || ch == '/') && !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

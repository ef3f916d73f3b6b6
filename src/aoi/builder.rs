//! Concentric buffer construction around a reference geometry.

use geo::{Geometry, MultiPolygon, Point};
use serde_json::json;

use crate::error::{AoiError, Result};
use crate::geometry::buffer_meters;
use crate::model::{Feature, PolyType};

pub const MIN_DISTANCE_M: u32 = 10;
pub const MAX_DISTANCE_M: u32 = 5000;

/// Validated set of buffer distances in meters, stored ascending.
#[derive(Debug, Clone)]
pub struct BufferSpec {
    distances: Vec<u32>,
}

impl BufferSpec {
    /// Distinct positive distances within [10, 5000] m; duplicates rejected.
    pub fn new(mut distances: Vec<u32>) -> Result<Self> {
        if distances.is_empty() {
            return Err(AoiError::InvalidBufferSpec(
                "at least one distance is required".into(),
            ));
        }
        for &d in &distances {
            if !(MIN_DISTANCE_M..=MAX_DISTANCE_M).contains(&d) {
                return Err(AoiError::InvalidBufferSpec(format!(
                    "distance {d}m outside [{MIN_DISTANCE_M}, {MAX_DISTANCE_M}]"
                )));
            }
        }
        distances.sort_unstable();
        if let Some(dup) = distances.windows(2).find(|w| w[0] == w[1]) {
            return Err(AoiError::InvalidBufferSpec(format!(
                "duplicate distance {}m",
                dup[0]
            )));
        }
        Ok(Self { distances })
    }

    /// Ascending order.
    pub fn distances(&self) -> &[u32] {
        &self.distances
    }
}

/// One buffer feature per distance, ascending. Ids are `{prefix}-{distance}`.
/// Buffer areas are monotonically non-decreasing with distance.
pub fn build_buffers(
    reference: &Geometry<f64>,
    spec: &BufferSpec,
    name_prefix: &str,
) -> Result<Vec<Feature>> {
    let mut features = Vec::with_capacity(spec.distances().len());
    for &distance in spec.distances() {
        let buffered = buffer_meters(reference, f64::from(distance))?;
        let feature = Feature::new(
            format!("{name_prefix}-{distance}"),
            format!("{name_prefix} - {distance}m"),
            PolyType::Buffer,
            compact(buffered),
        )
        .with_property("radius_m", json!(distance));
        features.push(feature);
    }
    Ok(features)
}

/// Raw reference point for preview display; excluded from final assembly.
pub fn build_center_feature(point: Point<f64>) -> Feature {
    Feature::new("center", "Center Point", PolyType::Center, Geometry::Point(point))
}

/// Single-part results are written as plain polygons.
fn compact(mp: MultiPolygon<f64>) -> Geometry<f64> {
    let mut parts = mp.0;
    if parts.len() == 1 {
        Geometry::Polygon(parts.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::area_sq_meters;

    fn area_of(feature: &Feature) -> f64 {
        match &feature.geometry {
            Geometry::Polygon(p) => area_sq_meters(&MultiPolygon::new(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => area_sq_meters(mp),
            _ => 0.0,
        }
    }

    #[test]
    fn test_spec_rejects_duplicates() {
        assert!(matches!(
            BufferSpec::new(vec![200, 300, 200]),
            Err(AoiError::InvalidBufferSpec(_))
        ));
    }

    #[test]
    fn test_spec_rejects_out_of_range() {
        assert!(BufferSpec::new(vec![5]).is_err());
        assert!(BufferSpec::new(vec![5001]).is_err());
        assert!(BufferSpec::new(vec![]).is_err());
    }

    #[test]
    fn test_spec_sorts_ascending() {
        let spec = BufferSpec::new(vec![400, 200, 300]).unwrap();
        assert_eq!(spec.distances(), &[200, 300, 400]);
    }

    #[test]
    fn test_point_buffers_scenario() {
        // Point in the Swiss Alps, radii 200/300/400.
        let center = Point::new(8.2275, 46.8182);
        let spec = BufferSpec::new(vec![200, 300, 400]).unwrap();
        let mut features =
            build_buffers(&Geometry::Point(center), &spec, "AOI-1").unwrap();
        features.push(build_center_feature(center));

        assert_eq!(features.len(), 4);
        assert_eq!(features[0].id, "AOI-1-200");
        assert_eq!(features[1].id, "AOI-1-300");
        assert_eq!(features[2].id, "AOI-1-400");
        assert_eq!(features[1].name, "AOI-1 - 300m");
        assert_eq!(features[3].poly_type, PolyType::Center);

        let areas: Vec<f64> = features[..3].iter().map(area_of).collect();
        assert!(areas[0] < areas[1] && areas[1] < areas[2], "areas: {areas:?}");
    }

    #[test]
    fn test_polygon_reference_grows_outward() {
        use geo::polygon;
        let square = polygon![
            (x: 8.2200, y: 46.8100),
            (x: 8.2300, y: 46.8100),
            (x: 8.2300, y: 46.8200),
            (x: 8.2200, y: 46.8200),
        ];
        let base_area = area_sq_meters(&MultiPolygon::new(vec![square.clone()]));
        let spec = BufferSpec::new(vec![100, 250]).unwrap();
        let features = build_buffers(&Geometry::Polygon(square), &spec, "EST-1").unwrap();

        let a0 = area_of(&features[0]);
        let a1 = area_of(&features[1]);
        assert!(a0 > base_area);
        assert!(a1 > a0);
    }
}

//! Metric buffering of reference geometries.
//!
//! Geometries are projected into a local azimuthal equidistant plane, dilated
//! in meters there, and reprojected to geographic coordinates.

use geo::{
    unary_union, Area, Centroid, Coord, Geometry, LineString, MapCoords, MultiPolygon, Polygon,
};

use crate::error::{AoiError, Result};

use super::projection::LocalProjection;
use super::validity::{repair_polygon, validate_polygon};

/// Segments per full circle in generated buffer arcs.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Buffer a geometry outward by `distance_m` meters.
///
/// Point references become circles; polygon references grow outward by the
/// distance. A larger distance never produces a smaller result. Returns a
/// `MultiPolygon` because disjoint parts of a MultiPolygon reference can stay
/// disjoint after dilation; the single-part case is the norm.
pub fn buffer_meters(geometry: &Geometry<f64>, distance_m: f64) -> Result<MultiPolygon<f64>> {
    if !distance_m.is_finite() || distance_m <= 0.0 {
        return Err(AoiError::InvalidBufferSpec(format!(
            "buffer distance must be positive, got {distance_m}"
        )));
    }

    let anchor = geometry
        .centroid()
        .ok_or_else(|| AoiError::InvalidGeometry("cannot buffer an empty geometry".into()))?;
    let proj = LocalProjection::new(anchor);

    let local = match geometry {
        Geometry::Point(p) => {
            let center = proj.project(Coord { x: p.x(), y: p.y() });
            MultiPolygon::new(vec![circle(center, distance_m)])
        }
        Geometry::Polygon(p) => dilate(&[checked(p)?], &proj, distance_m),
        Geometry::MultiPolygon(mp) => {
            if mp.0.is_empty() {
                return Err(AoiError::InvalidGeometry("cannot buffer an empty geometry".into()));
            }
            let polys: Result<Vec<Polygon<f64>>> = mp.0.iter().map(checked).collect();
            dilate(&polys?, &proj, distance_m)
        }
        other => {
            return Err(AoiError::InvalidGeometry(format!(
                "unsupported reference geometry: {other:?}"
            )))
        }
    };

    if local.0.is_empty() {
        return Err(AoiError::InvalidGeometry("buffering produced an empty result".into()));
    }

    Ok(local.map_coords(|c| proj.unproject(c)))
}

/// Validate the polygon, attempting repair before giving up.
fn checked(polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
    if validate_polygon(polygon).is_ok() {
        return Ok(polygon.clone());
    }
    repair_polygon(polygon).map_err(|e| AoiError::InvalidGeometry(e.to_string()))
}

/// Minkowski dilation by a disc in the local plane: the polygon itself,
/// rectangles along every ring edge, and circles at every ring vertex,
/// unioned into one result.
fn dilate(polygons: &[Polygon<f64>], proj: &LocalProjection, distance_m: f64) -> MultiPolygon<f64> {
    let mut pieces: Vec<Polygon<f64>> = Vec::new();

    for polygon in polygons {
        let local = polygon.map_coords(|c| proj.project(c));
        for ring in std::iter::once(local.exterior()).chain(local.interiors()) {
            for line in ring.lines() {
                if let Some(rect) = edge_rectangle(line.start, line.end, distance_m) {
                    pieces.push(rect);
                }
            }
            for c in ring.coords().take(ring.0.len().saturating_sub(1)) {
                pieces.push(circle(*c, distance_m));
            }
        }
        pieces.push(local);
    }

    unary_union(pieces.iter())
}

/// Regular polygon approximating a circle, counter-clockwise.
fn circle(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let theta = (i as f64) * std::f64::consts::TAU / (CIRCLE_SEGMENTS as f64);
            Coord {
                x: center.x + radius * theta.cos(),
                y: center.y + radius * theta.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Rectangle of half-width `d` along an edge; `None` for degenerate edges.
fn edge_rectangle(a: Coord<f64>, b: Coord<f64>, d: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    if len < 1e-9 {
        return None;
    }
    let nx = -dy / len * d;
    let ny = dx / len * d;
    // Counter-clockwise: `unary_union` treats clockwise exteriors as negative.
    Some(Polygon::new(
        LineString::new(vec![
            Coord { x: a.x - nx, y: a.y - ny },
            Coord { x: b.x - nx, y: b.y - ny },
            Coord { x: b.x + nx, y: b.y + ny },
            Coord { x: a.x + nx, y: a.y + ny },
        ]),
        vec![],
    ))
}

/// Planar area of a geographic multipolygon in square meters, measured in the
/// local projection around its centroid.
pub fn area_sq_meters(mp: &MultiPolygon<f64>) -> f64 {
    let Some(anchor) = mp.centroid() else {
        return 0.0;
    };
    let proj = LocalProjection::new(anchor);
    mp.map_coords(|c| proj.project(c)).unsigned_area()
}

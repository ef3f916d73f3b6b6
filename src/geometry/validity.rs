//! Polygon validity checks and best-effort repair.

use geo::algorithm::line_intersection::line_intersection;
use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, Geometry, Line, LineString, Polygon};

use crate::error::AoiError;

/// Check a polygon against the validity rule: closed non-degenerate exterior
/// ring without self-intersections, holes fully inside the exterior and not
/// overlapping each other.
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), String> {
    validate_ring(polygon.exterior(), "exterior")?;
    if polygon.unsigned_area() <= 0.0 {
        return Err("polygon has zero area".into());
    }

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    let holes: Vec<Polygon<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();

    for (i, (ring, hole)) in polygon.interiors().iter().zip(&holes).enumerate() {
        validate_ring(ring, "interior")?;
        if !shell.contains(hole) {
            return Err(format!("interior ring {i} is not contained in the exterior"));
        }
    }
    for i in 0..holes.len() {
        for j in (i + 1)..holes.len() {
            use geo::Intersects;
            if holes[i].intersects(&holes[j]) {
                return Err(format!("interior rings {i} and {j} overlap"));
            }
        }
    }
    Ok(())
}

/// Validity for the geometry kinds the core accepts.
pub fn validate_geometry(geometry: &Geometry<f64>) -> Result<(), String> {
    match geometry {
        Geometry::Point(p) => {
            if p.x().is_finite() && p.y().is_finite() {
                Ok(())
            } else {
                Err("point has non-finite coordinates".into())
            }
        }
        Geometry::Polygon(p) => validate_polygon(p),
        Geometry::MultiPolygon(mp) => {
            if mp.0.is_empty() {
                return Err("multipolygon is empty".into());
            }
            for (i, p) in mp.0.iter().enumerate() {
                validate_polygon(p).map_err(|e| format!("polygon {i}: {e}"))?;
            }
            Ok(())
        }
        other => Err(format!("unsupported geometry type: {other:?}")),
    }
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<(), String> {
    // geo closes rings on construction; a closed ring needs >= 4 coords.
    if ring.0.len() < 4 {
        return Err(format!("{label} ring has fewer than 4 coordinates"));
    }
    if !ring.is_closed() {
        return Err(format!("{label} ring is not closed"));
    }
    if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(format!("{label} ring has non-finite coordinates"));
    }
    if ring_self_intersects(ring) {
        return Err(format!("{label} ring is self-intersecting"));
    }
    Ok(())
}

/// Pairwise segment test; adjacent segments (which share an endpoint by
/// construction) are skipped.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let lines: Vec<Line<f64>> = ring.lines().collect();
    let n = lines.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            if line_intersection(lines[i], lines[j]).is_some() {
                return true;
            }
        }
    }
    false
}

/// Best-effort fix for minor self-intersections: drop duplicate consecutive
/// coordinates, reorient the rings, and as a last resort resolve crossings
/// through a self-union (the planar analogue of a zero-width buffer).
pub fn repair_polygon(polygon: &Polygon<f64>) -> Result<Polygon<f64>, AoiError> {
    let cleaned = dedupe_polygon(polygon).orient(Direction::Default);
    if validate_polygon(&cleaned).is_ok() {
        return Ok(cleaned);
    }

    let resolved = cleaned.union(&cleaned);
    let best = resolved
        .0
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .ok_or_else(|| AoiError::GeometryRepair("repair produced an empty result".into()))?;

    validate_polygon(&best).map_err(AoiError::GeometryRepair)?;
    Ok(best)
}

fn dedupe_polygon(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(
        dedupe_ring(polygon.exterior()),
        polygon.interiors().iter().map(dedupe_ring).collect(),
    )
}

fn dedupe_ring(ring: &LineString<f64>) -> LineString<f64> {
    let mut coords = ring.0.clone();
    coords.dedup();
    LineString::new(coords)
}

//! Session-scoped node sets and spatial filtering.
//!
//! Uploads are indexed once and referenced by an opaque key. The store treats
//! every key it receives as possibly expired: lookups of evicted keys fail
//! with `UnknownNodeSet`, a normal recoverable condition.

pub mod csv;

use geo::{Geometry, Intersects, Point, Polygon};
use hashbrown::HashMap;
use rayon::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AoiError, Result};
use crate::geometry::buffer_meters;
use crate::index::NodeIndex;
use crate::model::{Feature, PolyType};

struct StoredNodeSet {
    index: Arc<NodeIndex>,
    last_used: Instant,
}

/// TTL-bounded store of uploaded node sets, keyed by opaque strings.
pub struct NodeSetStore {
    inner: Mutex<HashMap<String, StoredNodeSet>>,
    ttl: Duration,
}

impl NodeSetStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Index the upload once and hand back its capability key.
    pub fn insert(&self, points: &[(f64, f64)]) -> String {
        let key = Uuid::new_v4().to_string();
        let index = Arc::new(NodeIndex::build(points));
        let mut map = self.inner.lock().expect("node set store poisoned");
        sweep(&mut map, self.ttl);
        map.insert(
            key.clone(),
            StoredNodeSet {
                index,
                last_used: Instant::now(),
            },
        );
        key
    }

    /// Resolve a key, refreshing its lifetime.
    pub fn resolve(&self, key: &str) -> Result<Arc<NodeIndex>> {
        let mut map = self.inner.lock().expect("node set store poisoned");
        sweep(&mut map, self.ttl);
        match map.get_mut(key) {
            Some(stored) => {
                stored.last_used = Instant::now();
                Ok(Arc::clone(&stored.index))
            }
            None => Err(AoiError::UnknownNodeSet(key.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("node set store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep(map: &mut HashMap<String, StoredNodeSet>, ttl: Duration) {
    let before = map.len();
    map.retain(|_, stored| stored.last_used.elapsed() <= ttl);
    let evicted = before - map.len();
    if evicted > 0 {
        debug!(evicted, "expired node sets evicted");
    }
}

/// Result of a radius filter: the matching points and the buffer polygon the
/// test used, so the caller renders both consistently.
pub struct FilterOutcome {
    /// `[lat, lon]` pairs in upload order.
    pub points: Vec<[f64; 2]>,
    pub buffer: Feature,
}

/// Filter a stored node set to the points within `radius_m` of `center`.
pub fn filter_near(
    store: &NodeSetStore,
    key: &str,
    center: Point<f64>,
    radius_m: f64,
) -> Result<FilterOutcome> {
    let index = store.resolve(key)?;
    filter_index(&index, center, radius_m)
}

/// Same filter against an index the caller already holds. The buffer feature
/// comes from the identical `buffer_meters` call the Buffer Builder uses, so
/// the radius semantics cannot diverge.
pub fn filter_index(index: &NodeIndex, center: Point<f64>, radius_m: f64) -> Result<FilterOutcome> {
    let buffered = buffer_meters(&Geometry::Point(center), radius_m)?;
    let geometry = if buffered.0.len() == 1 {
        Geometry::Polygon(buffered.0.into_iter().next().expect("one part"))
    } else {
        Geometry::MultiPolygon(buffered)
    };

    let buffer = Feature::new(
        "filter-buffer",
        format!("{radius_m} m buffer"),
        PolyType::Buffer,
        geometry,
    )
    .with_property("radius_m", json!(radius_m))
    .with_property("center_lat", json!(center.y()))
    .with_property("center_lon", json!(center.x()));

    let points = index
        .within_radius(center, radius_m)
        .into_iter()
        .map(|p| [p.y(), p.x()])
        .collect();

    Ok(FilterOutcome { points, buffer })
}

/// Authoritative containment count over raw points, boundary inclusive.
/// Agrees exactly with `NodeIndex::within_polygon` on the same inputs.
pub fn count_in_polygon(polygon: &Polygon<f64>, points: &[(f64, f64)]) -> usize {
    points
        .par_iter()
        .filter(|&&(lat, lon)| polygon.intersects(&Point::new(lon, lat)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_unknown_key_is_recoverable_error() {
        let store = NodeSetStore::new(Duration::from_secs(60));
        let err = store.resolve("no-such-key").unwrap_err();
        assert!(matches!(err, AoiError::UnknownNodeSet(_)));
    }

    #[test]
    fn test_expired_key_is_evicted() {
        let store = NodeSetStore::new(Duration::ZERO);
        let key = store.insert(&[(47.0, 8.0)]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            store.resolve(&key),
            Err(AoiError::UnknownNodeSet(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_filter_near_returns_points_and_buffer() {
        let store = NodeSetStore::new(Duration::from_secs(60));
        let center = Point::new(8.54, 47.37);
        // ~100 m east of center, and one far away.
        let near = (47.37, 8.54 + 100.0 / 75_500.0);
        let key = store.insert(&[near, (48.0, 9.0)]);

        let outcome = filter_near(&store, &key, center, 500.0).unwrap();
        assert_eq!(outcome.points.len(), 1);
        assert_eq!(outcome.buffer.poly_type, PolyType::Buffer);
        assert_eq!(
            outcome.buffer.extra.get("radius_m"),
            Some(&json!(500.0))
        );
    }

    #[test]
    fn test_count_agrees_with_index_query() {
        let square = polygon![
            (x: 8.50, y: 47.30),
            (x: 8.60, y: 47.30),
            (x: 8.60, y: 47.40),
            (x: 8.50, y: 47.40),
        ];
        let points: Vec<(f64, f64)> = (0..500)
            .map(|i| {
                let t = i as f64 / 500.0;
                (47.25 + t * 0.2, 8.45 + (t * 7.0).fract() * 0.2)
            })
            .collect();

        let index = NodeIndex::build(&points);
        let via_index = index.within_polygon(&square).len();
        let via_count = count_in_polygon(&square, &points);
        assert_eq!(via_index, via_count);
        assert!(via_count > 0);
    }
}

//! Spatial index for fast proximity and containment queries over node sets.
//!
//! Built once per upload, then treated as immutable; queries never mutate.

use geo::{BoundingRect, Coord, Intersects, Point, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::geometry::LocalProjection;

// Conservative meters-per-degree used only for envelope prefilters; the
// exact test runs in the local projection.
const METERS_PER_DEGREE: f64 = 110_000.0;

/// One indexed node carrying its insertion sequence so query output order is
/// deterministic for a given index state.
#[derive(Debug, Clone)]
struct IndexedNode {
    /// lon, lat
    pos: [f64; 2],
    seq: usize,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

/// R-tree over an uploaded node set.
#[derive(Debug)]
pub struct NodeIndex {
    tree: RTree<IndexedNode>,
}

impl NodeIndex {
    /// Bulk-load an index from `(lat, lon)` pairs in upload order.
    pub fn build(points: &[(f64, f64)]) -> Self {
        let indexed: Vec<IndexedNode> = points
            .iter()
            .enumerate()
            .map(|(seq, &(lat, lon))| IndexedNode {
                pos: [lon, lat],
                seq,
            })
            .collect();
        let tree = RTree::bulk_load(indexed);
        debug!("node index built with {} entries", tree.size());
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Every node within `radius_m` meters of `center` (boundary inclusive),
    /// measured in the same local projection buffering uses. Insertion order.
    pub fn within_radius(&self, center: Point<f64>, radius_m: f64) -> Vec<Point<f64>> {
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Vec::new();
        }
        let proj = LocalProjection::new(center);

        let pad_lat = radius_m / METERS_PER_DEGREE;
        let cos_lat = center.y().to_radians().cos().abs().max(0.01);
        let pad_lon = radius_m / (METERS_PER_DEGREE * cos_lat);
        let envelope = AABB::from_corners(
            [center.x() - pad_lon, center.y() - pad_lat],
            [center.x() + pad_lon, center.y() + pad_lat],
        );

        let r2 = radius_m * radius_m;
        let mut hits: Vec<&IndexedNode> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|node| {
                let p = proj.project(Coord {
                    x: node.pos[0],
                    y: node.pos[1],
                });
                p.x * p.x + p.y * p.y <= r2
            })
            .collect();
        hits.sort_unstable_by_key(|node| node.seq);
        hits.into_iter()
            .map(|node| Point::new(node.pos[0], node.pos[1]))
            .collect()
    }

    /// Every node inside `polygon`, boundary inclusive. Insertion order.
    pub fn within_polygon(&self, polygon: &Polygon<f64>) -> Vec<Point<f64>> {
        let Some(rect) = polygon.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        let mut hits: Vec<&IndexedNode> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|node| polygon.intersects(&Point::new(node.pos[0], node.pos[1])))
            .collect();
        hits.sort_unstable_by_key(|node| node.seq);
        hits.into_iter()
            .map(|node| Point::new(node.pos[0], node.pos[1]))
            .collect()
    }
}

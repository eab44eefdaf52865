//! In-memory R-tree over a boundary layer.

use collision_map_boundary_models::{PolygonFeature, PolygonLayer};
use geo::{BoundingRect as _, Intersects as _, MultiPolygon, Point, Within as _};
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialPredicate;

/// A boundary polygon stored in the R-tree with its position in the layer.
struct IndexEntry<'a> {
    position: usize,
    envelope: AABB<[f64; 2]>,
    feature: &'a PolygonFeature,
}

impl RTreeObject for IndexEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over one layer's polygons.
///
/// Candidates come from envelope intersection; every match is confirmed
/// with an exact geometric test. Results are ordered by layer position so
/// overlapping polygons resolve deterministically.
pub struct PolygonIndex<'a> {
    layer: &'a PolygonLayer,
    tree: RTree<IndexEntry<'a>>,
}

impl<'a> PolygonIndex<'a> {
    /// Bulk-loads the index for `layer`.
    #[must_use]
    pub fn build(layer: &'a PolygonLayer) -> Self {
        let entries = layer
            .features
            .iter()
            .enumerate()
            .map(|(position, feature)| IndexEntry {
                position,
                envelope: compute_envelope(&feature.geometry),
                feature,
            })
            .collect();

        log::debug!("{}: indexed {} polygons", layer.name, layer.len());

        Self {
            layer,
            tree: RTree::bulk_load(entries),
        }
    }

    /// The indexed layer.
    #[must_use]
    pub const fn layer(&self) -> &'a PolygonLayer {
        self.layer
    }

    /// Polygons matching `point` under `predicate`, in layer order.
    ///
    /// For [`SpatialPredicate::Within`] at most one polygon is returned; when
    /// polygons overlap, the first in layer order wins.
    #[must_use]
    pub fn matches(
        &self,
        point: &Point<f64>,
        predicate: SpatialPredicate,
    ) -> Vec<&'a PolygonFeature> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut hits: Vec<(usize, &'a PolygonFeature)> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| match predicate {
                SpatialPredicate::Within => point.is_within(&entry.feature.geometry),
                SpatialPredicate::Intersects => entry.feature.geometry.intersects(point),
            })
            .map(|entry| (entry.position, entry.feature))
            .collect();

        hits.sort_unstable_by_key(|(position, _)| *position);
        if predicate == SpatialPredicate::Within {
            hits.truncate(1);
        }

        hits.into_iter().map(|(_, feature)| feature).collect()
    }

    /// Whether any indexed polygon intersects `geometry`.
    #[must_use]
    pub fn intersects_any(&self, geometry: &MultiPolygon<f64>) -> bool {
        let query_env = compute_envelope(geometry);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| entry.feature.geometry.intersects(geometry))
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

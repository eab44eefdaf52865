//! Point-to-polygon and polygon-to-polygon joins.

use collision_map_boundary_models::{PolygonFeature, PolygonLayer};
use collision_map_incident_models::{PointLayer, PointRecord};

use crate::progress::{PROGRESS_CHUNK, ProgressCallback};
use crate::{PolygonIndex, SpatialError, SpatialPredicate, ensure_same_crs};

/// A point paired with the polygon it fell in.
///
/// `polygon` is `None` when the point lies outside every polygon; such
/// records are kept rather than dropped (left join, point side).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRecord<'a> {
    /// The source point.
    pub point: &'a PointRecord,
    /// The matching polygon, if any.
    pub polygon: Option<&'a PolygonFeature>,
}

impl<'a> JoinedRecord<'a> {
    /// Identifier of the matching polygon.
    #[must_use]
    pub fn polygon_id(&self) -> Option<&'a str> {
        self.polygon.map(|polygon| polygon.id.as_str())
    }

    /// A polygon attribute, or `None` for unmatched points and absent
    /// attributes alike.
    #[must_use]
    pub fn polygon_attribute(&self, name: &str) -> Option<&'a serde_json::Value> {
        self.polygon?.attributes.get(name)
    }
}

/// Joins every point to the polygons of `layer` under `predicate`.
///
/// Output order follows the points. Under [`SpatialPredicate::Intersects`]
/// a point touching several polygons yields one record per polygon, in
/// layer order.
///
/// # Errors
///
/// Returns [`SpatialError::CrsMismatch`] if the point and polygon CRSs differ.
pub fn join_points<'a>(
    points: &'a PointLayer,
    layer: &'a PolygonLayer,
    predicate: SpatialPredicate,
    progress: &dyn ProgressCallback,
) -> Result<Vec<JoinedRecord<'a>>, SpatialError> {
    ensure_same_crs("points", &points.crs, &layer.name, &layer.crs)?;

    let index = PolygonIndex::build(layer);
    let mut joined = Vec::with_capacity(points.records.len());
    let mut unmatched = 0usize;

    progress.set_total(points.records.len() as u64);
    progress.set_message(format!("Joining points to {}", layer.name));

    for (i, point) in points.records.iter().enumerate() {
        let matches = index.matches(&point.point, predicate);
        if matches.is_empty() {
            unmatched += 1;
            joined.push(JoinedRecord {
                point,
                polygon: None,
            });
        } else {
            joined.extend(matches.into_iter().map(|polygon| JoinedRecord {
                point,
                polygon: Some(polygon),
            }));
        }

        if (i + 1) % PROGRESS_CHUNK == 0 {
            progress.inc(PROGRESS_CHUNK as u64);
        }
    }
    progress.inc((points.records.len() % PROGRESS_CHUNK) as u64);

    log::info!(
        "{}: joined {} points ({predicate}), {unmatched} outside every polygon",
        layer.name,
        points.records.len(),
    );
    progress.finish(format!(
        "{}: {} points joined, {unmatched} unmatched",
        layer.name,
        points.records.len()
    ));

    Ok(joined)
}

/// Keeps the polygons of `layer` that intersect at least one polygon of
/// `mask`, preserving layer order.
///
/// # Errors
///
/// Returns [`SpatialError::CrsMismatch`] if the two layers' CRSs differ.
pub fn subset_intersecting(
    layer: &PolygonLayer,
    mask: &PolygonLayer,
) -> Result<PolygonLayer, SpatialError> {
    ensure_same_crs(&layer.name, &layer.crs, &mask.name, &mask.crs)?;

    let index = PolygonIndex::build(mask);
    let features: Vec<PolygonFeature> = layer
        .features
        .iter()
        .filter(|feature| index.intersects_any(&feature.geometry))
        .cloned()
        .collect();

    log::info!(
        "{}: kept {} of {} polygons intersecting {}",
        layer.name,
        features.len(),
        layer.len(),
        mask.name
    );

    Ok(PolygonLayer {
        name: layer.name.clone(),
        crs: layer.crs.clone(),
        features,
    })
}

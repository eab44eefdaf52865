//! Reattaching metrics to base geometry.

use std::collections::{BTreeMap, BTreeSet};

use collision_map_analytics_models::{DensityRow, METRIC_ATTRIBUTES, MergedFeature};
use collision_map_boundary_models::{PolygonLayer, SOURCE_PREFIX};

/// Left-joins density rows onto every feature of `layer` by exact
/// identifier match.
///
/// All base features are kept, in layer order; features without a density
/// row carry `metrics: None`. Rows whose identifier is not in the layer are
/// ignored with a warning, as are source attributes that the exported
/// metrics will displace.
#[must_use]
pub fn merge_layer<'a>(layer: &'a PolygonLayer, rows: &[DensityRow]) -> Vec<MergedFeature<'a>> {
    let mut by_id: BTreeMap<&str, &DensityRow> =
        rows.iter().map(|row| (row.id.as_str(), row)).collect();

    let merged: Vec<MergedFeature<'a>> = layer
        .features
        .iter()
        .map(|feature| MergedFeature {
            feature,
            metrics: by_id.remove(feature.id.as_str()).cloned(),
        })
        .collect();

    if !by_id.is_empty() {
        log::warn!(
            "{}: {} density rows have no matching polygon: {:?}",
            layer.name,
            by_id.len(),
            by_id.keys().collect::<Vec<_>>()
        );
    }

    let shadowed: BTreeSet<&str> = layer
        .features
        .iter()
        .flat_map(|feature| feature.attributes.keys())
        .map(String::as_str)
        .filter(|key| METRIC_ATTRIBUTES.contains(key))
        .collect();
    if !shadowed.is_empty() {
        log::warn!(
            "{}: source attributes {shadowed:?} will be exported with a {SOURCE_PREFIX:?} prefix",
            layer.name
        );
    }

    let matched = merged.iter().filter(|m| m.metrics.is_some()).count();
    log::info!(
        "{}: merged metrics onto {matched} of {} polygons",
        layer.name,
        merged.len()
    );

    merged
}

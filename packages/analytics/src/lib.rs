#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Post-join analysis stages.
//!
//! Each stage takes the previous stage's output by reference and returns a
//! new value: joined records are counted per polygon, counts are normalized
//! by polygon area, and the resulting metrics are merged back onto the base
//! geometry or joined to external attributes for correlation.

pub mod aggregate;
pub mod density;
pub mod external;
pub mod merge;

pub use aggregate::{count_by_polygon, with_zero_counts};
pub use density::{compute_densities, density, polygon_area};
pub use external::{correlate, join_external, pivot_wider};
pub use merge::merge_layer;

use collision_map_boundary_models::Crs;
use thiserror::Error;

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A polygon has no usable area, so density is undefined.
    #[error("Degenerate geometry for {id}: area {area}")]
    DegenerateGeometry {
        /// Polygon identifier.
        id: String,
        /// The computed area.
        area: f64,
    },

    /// The layer CRS is not in the built-in table and no linear unit was
    /// configured.
    #[error("Cannot compute areas in {crs}: unknown CRS and no linear_unit configured")]
    UnsupportedCrs {
        /// The layer CRS.
        crs: Crs,
    },

    /// An aggregate row names a polygon that is not in the layer.
    #[error("Identifier {id} is not in the polygon layer")]
    UnknownIdentifier {
        /// The unmatched identifier.
        id: String,
    },

    /// Long-form data holds more than one value for the same pair.
    #[error("Duplicate observation of {variable} for {id}")]
    DuplicateObservation {
        /// Geography identifier.
        id: String,
        /// Variable name.
        variable: String,
    },
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use collision_map_analytics_models::{AreaUnit, DensityOptions, MergedFeature};
    use collision_map_boundary_models::{PolygonFeature, PolygonLayer};
    use collision_map_incident_models::{CleaningReport, PointLayer, PointRecord};
    use collision_map_spatial::progress::NullProgress;
    use collision_map_spatial::{SpatialPredicate, join_points};
    use geo::{MultiPolygon, Point, polygon};

    use super::*;

    fn square(id: &str, x0: f64) -> PolygonFeature {
        PolygonFeature {
            id: id.to_string(),
            geometry: MultiPolygon(vec![polygon![
                (x: x0, y: 0.0),
                (x: x0 + 10.0, y: 0.0),
                (x: x0 + 10.0, y: 10.0),
                (x: x0, y: 10.0),
            ]]),
            attributes: serde_json::Map::new(),
        }
    }

    fn collisions(crs: &Crs, coords: &[(f64, f64)]) -> PointLayer {
        let records = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| PointRecord {
                source_row: i as u64 + 1,
                point: Point::new(x, y),
                date: "2018-06-01".to_string(),
                attributes: BTreeMap::new(),
            })
            .collect();
        PointLayer {
            crs: crs.clone(),
            records,
            report: CleaningReport::default(),
        }
    }

    #[test]
    fn stages_chain_from_join_to_merge() {
        let crs = Crs::parse("EPSG:32618").unwrap();
        let layer = PolygonLayer {
            name: "neighborhoods".to_string(),
            crs: crs.clone(),
            features: vec![square("A", 0.0), square("B", 20.0), square("C", 40.0)],
        };
        let coords = [
            (2.0, 2.0),
            (5.0, 5.0),
            (25.0, 5.0),
            (100.0, 100.0),
            (-5.0, -5.0),
        ];
        let pts = collisions(&crs, &coords);

        let joined = join_points(&pts, &layer, SpatialPredicate::Within, &NullProgress).unwrap();
        assert_eq!(joined.len(), 5);
        assert_eq!(joined.iter().filter(|r| r.polygon.is_none()).count(), 2);

        let counts = count_by_polygon(&joined);
        let pairs: Vec<(&str, u64)> = counts.iter().map(|r| (r.id.as_str(), r.count)).collect();
        assert_eq!(pairs, vec![("A", 2), ("B", 1)]);

        let options = DensityOptions {
            unit: AreaUnit::SquareMetres,
            ..DensityOptions::default()
        };
        let densities = compute_densities(&layer, &counts, &options).unwrap();
        assert_eq!(densities.len(), 2);
        assert!((densities[0].density - 0.02).abs() < 1e-12);
        assert!((densities[1].density - 0.01).abs() < 1e-12);

        let merged = merge_layer(&layer, &densities);
        let exported: Vec<PolygonFeature> = merged.iter().map(MergedFeature::to_feature).collect();
        let ids: Vec<&str> = exported.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(exported[0].attributes["count"], 2);
        assert_eq!(exported[1].attributes["count"], 1);
        assert!(exported[2].attributes["count"].is_null());
        assert!(exported[2].attributes["density"].is_null());
    }
}

//! Point counts per polygon.

use std::collections::BTreeMap;

use collision_map_analytics_models::AggregateRow;
use collision_map_boundary_models::PolygonLayer;
use collision_map_spatial::JoinedRecord;

/// Counts joined records per polygon identifier.
///
/// Records with no polygon are excluded. Polygons that no point fell in get
/// no row at all (not a zero row). Output is sorted by identifier.
#[must_use]
pub fn count_by_polygon(records: &[JoinedRecord<'_>]) -> Vec<AggregateRow> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();

    for id in records.iter().filter_map(JoinedRecord::polygon_id) {
        *counts.entry(id).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(id, count)| AggregateRow {
            id: id.to_string(),
            count,
        })
        .collect()
}

/// Adds a zero-count row for every polygon of `layer` missing from `rows`.
///
/// Output stays sorted by identifier.
#[must_use]
pub fn with_zero_counts(layer: &PolygonLayer, rows: &[AggregateRow]) -> Vec<AggregateRow> {
    let mut counts: BTreeMap<&str, u64> = layer
        .features
        .iter()
        .map(|feature| (feature.id.as_str(), 0))
        .collect();

    for row in rows {
        counts.insert(row.id.as_str(), row.count);
    }

    counts
        .into_iter()
        .map(|(id, count)| AggregateRow {
            id: id.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use collision_map_boundary_models::{Crs, PolygonFeature};
    use collision_map_incident_models::PointRecord;
    use geo::{MultiPolygon, Point, polygon};

    use super::*;

    fn feature(id: &str) -> PolygonFeature {
        PolygonFeature {
            id: id.to_string(),
            geometry: MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
            ]]),
            attributes: serde_json::Map::new(),
        }
    }

    fn point(row: u64) -> PointRecord {
        PointRecord {
            source_row: row,
            point: Point::new(0.5, 0.5),
            date: "2018-01-01".to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn joined<'a>(point: &'a PointRecord, polygon: Option<&'a PolygonFeature>) -> JoinedRecord<'a> {
        JoinedRecord { point, polygon }
    }

    fn row(id: &str, count: u64) -> AggregateRow {
        AggregateRow {
            id: id.to_string(),
            count,
        }
    }

    #[test]
    fn counts_matched_records_and_skips_unmatched() {
        let a = feature("A");
        let b = feature("B");
        let points: Vec<PointRecord> = (1..=5).map(point).collect();
        let records = vec![
            joined(&points[0], Some(&b)),
            joined(&points[1], Some(&a)),
            joined(&points[2], None),
            joined(&points[3], Some(&a)),
            joined(&points[4], None),
        ];

        let rows = count_by_polygon(&records);
        assert_eq!(rows, vec![row("A", 2), row("B", 1)]);
        assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 3);
    }

    #[test]
    fn counting_twice_gives_the_same_rows() {
        let a = feature("A");
        let points: Vec<PointRecord> = (1..=2).map(point).collect();
        let records = vec![joined(&points[0], Some(&a)), joined(&points[1], Some(&a))];
        assert_eq!(count_by_polygon(&records), count_by_polygon(&records));
    }

    #[test]
    fn no_records_gives_no_rows() {
        assert!(count_by_polygon(&[]).is_empty());
    }

    #[test]
    fn zero_counts_fill_missing_polygons() {
        let layer = PolygonLayer {
            name: "neighborhoods".to_string(),
            crs: Crs::wgs84(),
            features: vec![feature("C"), feature("A"), feature("B")],
        };
        let rows = vec![row("A", 2)];

        let filled = with_zero_counts(&layer, &rows);
        let pairs: Vec<(&str, u64)> = filled.iter().map(|r| (r.id.as_str(), r.count)).collect();
        assert_eq!(pairs, vec![("A", 2), ("B", 0), ("C", 0)]);
    }
}

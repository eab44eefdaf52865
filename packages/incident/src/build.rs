//! Builds a [`PointLayer`] from a delimited collision export.

use std::collections::BTreeMap;
use std::path::Path;

use collision_map_boundary_models::Crs;
use collision_map_incident_models::{
    CleaningReport, IncidentSourceConfig, PointLayer, PointRecord,
};
use geo::Point;

use crate::IncidentError;
use crate::parsing::{is_missing, is_valid_year, matches_year, parse_coordinate};

/// Column positions of the required fields.
struct RequiredColumns {
    x: usize,
    y: usize,
    date: usize,
}

/// Reads, cleans, and year-filters the export at `path`.
///
/// Rows missing any required value are dropped, never imputed. Rows with
/// non-numeric coordinates are dropped and counted separately. The
/// surviving points are declared to be in `crs`.
///
/// # Errors
///
/// * [`IncidentError::InvalidYear`] if the configured year is not four digits
/// * [`IncidentError::InvalidDelimiter`] if the delimiter is not one byte
/// * [`IncidentError::Load`] if the file cannot be opened or parsed
/// * [`IncidentError::Schema`] if a required column is absent
pub fn build_point_layer(
    path: &Path,
    config: &IncidentSourceConfig,
    crs: Crs,
) -> Result<PointLayer, IncidentError> {
    if let Some(year) = &config.year
        && !is_valid_year(year)
    {
        return Err(IncidentError::InvalidYear { year: year.clone() });
    }

    let delimiter = match config.delimiter.as_deref() {
        None => b',',
        Some(d) if d.len() == 1 => d.as_bytes()[0],
        Some(d) => {
            return Err(IncidentError::InvalidDelimiter {
                delimiter: d.to_string(),
            });
        }
    };

    let load_error = |source| IncidentError::Load {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(load_error)?;

    let headers = repair_headers(
        reader
            .headers()
            .map_err(load_error)?
            .iter()
            .map(|h| h.trim().to_owned())
            .collect(),
        config.repair_first_column.as_deref(),
    );
    let columns = locate_required(path, &headers, config)?;

    let mut report = CleaningReport::default();
    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(load_error)?;
        report.total_rows += 1;

        let field = |i: usize| {
            record
                .get(i)
                .map(str::trim)
                .filter(|value| !is_missing(value))
        };

        let (Some(x), Some(y), Some(date)) =
            (field(columns.x), field(columns.y), field(columns.date))
        else {
            report.dropped_incomplete += 1;
            continue;
        };

        let (Some(x), Some(y)) = (parse_coordinate(x), parse_coordinate(y)) else {
            log::debug!("Row {}: non-numeric coordinates ({x}, {y})", index + 1);
            report.dropped_invalid_coordinates += 1;
            continue;
        };

        if let Some(year) = &config.year
            && !matches_year(date, year, config.date_matching)
        {
            report.dropped_other_year += 1;
            continue;
        }

        let attributes: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.get(i).unwrap_or("").trim();
                (header.clone(), value.to_owned())
            })
            .collect();

        records.push(PointRecord {
            source_row: index as u64 + 1,
            point: Point::new(x, y),
            date: date.to_owned(),
            attributes,
        });
        report.retained += 1;
    }

    log_report(path, &report, config);

    Ok(PointLayer {
        crs,
        records,
        report,
    })
}

/// Renames the first header to its canonical name, if configured.
fn repair_headers(mut headers: Vec<String>, canonical: Option<&str>) -> Vec<String> {
    if let Some(canonical) = canonical
        && let Some(first) = headers.first_mut()
        && first.as_str() != canonical
    {
        log::debug!("Renaming first column {first:?} to {canonical:?}");
        canonical.clone_into(first);
    }
    headers
}

fn locate_required(
    path: &Path,
    headers: &[String],
    config: &IncidentSourceConfig,
) -> Result<RequiredColumns, IncidentError> {
    let find = |column: &str| {
        headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| IncidentError::Schema {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };

    Ok(RequiredColumns {
        x: find(&config.x_column)?,
        y: find(&config.y_column)?,
        date: find(&config.date_column)?,
    })
}

fn log_report(path: &Path, report: &CleaningReport, config: &IncidentSourceConfig) {
    log::info!(
        "{}: retained {} of {} rows",
        path.display(),
        report.retained,
        report.total_rows
    );
    if report.dropped_incomplete > 0 {
        log::warn!(
            "{}: dropped {} rows with missing {}/{}/{}",
            path.display(),
            report.dropped_incomplete,
            config.x_column,
            config.y_column,
            config.date_column,
        );
    }
    if report.dropped_invalid_coordinates > 0 {
        log::warn!(
            "{}: dropped {} rows with non-numeric coordinates",
            path.display(),
            report.dropped_invalid_coordinates
        );
    }
    if let Some(year) = &config.year {
        log::info!(
            "{}: {} rows outside {year} ({} matching)",
            path.display(),
            report.dropped_other_year,
            config.date_matching
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use collision_map_incident_models::DateMatching;

    use super::*;

    fn write_csv(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("collision-map-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("collisions.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn config(path: &Path) -> IncidentSourceConfig {
        IncidentSourceConfig {
            path: path.to_path_buf(),
            x_column: "X".to_string(),
            y_column: "Y".to_string(),
            date_column: "CRASH_DATE".to_string(),
            repair_first_column: Some("X".to_string()),
            year: Some("2018".to_string()),
            date_matching: DateMatching::Prefix,
            crs: None,
            delimiter: None,
        }
    }

    const EXPORT: &str = "\
Ã¯Â»Â¿X,Y,CRASH_DATE,BOROUGH
1.5,2.5,2018-03-04,QUEENS
,2.5,2018-05-01,QUEENS
3.0,NA,2018-05-01,BRONX
4.0,4.0,,BRONX
abc,4.0,2018-06-01,BRONX
5.0,5.0,2017-12-31,BROOKLYN
6.0,6.0,20180304,MANHATTAN
";

    #[test]
    fn repairs_header_drops_incomplete_and_filters_year() {
        let path = write_csv(EXPORT);
        let layer = build_point_layer(&path, &config(&path), Crs::wgs84()).unwrap();

        assert_eq!(
            layer.report,
            CleaningReport {
                total_rows: 7,
                dropped_incomplete: 3,
                dropped_invalid_coordinates: 1,
                dropped_other_year: 1,
                retained: 2,
            }
        );

        let rows: Vec<u64> = layer.records.iter().map(|r| r.source_row).collect();
        assert_eq!(rows, vec![1, 7]);

        let first = &layer.records[0];
        assert_eq!(first.point, Point::new(1.5, 2.5));
        assert_eq!(first.date, "2018-03-04");
        assert_eq!(first.attributes["X"], "1.5");
        assert_eq!(first.attributes["BOROUGH"], "QUEENS");
        assert_eq!(layer.crs, Crs::wgs84());
    }

    #[test]
    fn malformed_date_with_matching_prefix_is_retained() {
        let path = write_csv(EXPORT);
        let layer = build_point_layer(&path, &config(&path), Crs::wgs84()).unwrap();
        assert!(layer.records.iter().any(|r| r.date == "20180304"));
    }

    #[test]
    fn calendar_mode_uses_parsed_year() {
        let path = write_csv("X,Y,CRASH_DATE\n1,1,2018-13-45\n2,2,03/04/2018\n");
        let mut cfg = config(&path);
        cfg.date_matching = DateMatching::Calendar;
        let layer = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap();

        assert_eq!(layer.records.len(), 1);
        assert_eq!(layer.records[0].date, "03/04/2018");
    }

    #[test]
    fn other_target_year_rejects_records() {
        let path = write_csv(EXPORT);
        let mut cfg = config(&path);
        cfg.year = Some("2017".to_string());
        let layer = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap();
        assert_eq!(layer.records.len(), 1);
        assert_eq!(layer.records[0].attributes["BOROUGH"], "BROOKLYN");
    }

    #[test]
    fn no_year_keeps_all_complete_rows() {
        let path = write_csv(EXPORT);
        let mut cfg = config(&path);
        cfg.year = None;
        let layer = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap();
        assert_eq!(layer.report.retained, 3);
        assert_eq!(layer.report.dropped_other_year, 0);
    }

    #[test]
    fn missing_column_without_repair_is_schema_error() {
        let path = write_csv(EXPORT);
        let mut cfg = config(&path);
        cfg.repair_first_column = None;
        let err = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap_err();
        assert!(matches!(err, IncidentError::Schema { ref column, .. } if column == "X"));
    }

    #[test]
    fn missing_date_column_is_schema_error() {
        let path = write_csv("X,Y,DATE\n1,1,2018-01-01\n");
        let err = build_point_layer(&path, &config(&path), Crs::wgs84()).unwrap_err();
        assert!(matches!(err, IncidentError::Schema { ref column, .. } if column == "CRASH_DATE"));
    }

    #[test]
    fn invalid_year_is_rejected_before_reading() {
        let path = PathBuf::from("/not/read.csv");
        let mut cfg = config(&path);
        cfg.year = Some("18".to_string());
        let err = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap_err();
        assert!(matches!(err, IncidentError::InvalidYear { .. }));
    }

    #[test]
    fn missing_file_is_load_error() {
        let path = PathBuf::from("/definitely/not/here.csv");
        let err = build_point_layer(&path, &config(&path), Crs::wgs84()).unwrap_err();
        assert!(matches!(err, IncidentError::Load { .. }));
    }

    #[test]
    fn honors_custom_delimiter() {
        let path = write_csv("X;Y;CRASH_DATE\n1;2;2018-01-01\n");
        let mut cfg = config(&path);
        cfg.delimiter = Some(";".to_string());
        let layer = build_point_layer(&path, &cfg, Crs::wgs84()).unwrap();
        assert_eq!(layer.records[0].point, Point::new(1.0, 2.0));
    }
}

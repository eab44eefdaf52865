//! Long-form observation CSVs.

use std::path::Path;

use collision_map_analytics_models::LongRow;
use collision_map_census_models::LongCsvSource;

use crate::CensusError;

const MISSING_VALUES: &[&str] = &["", "NA", "N/A", "null", "-"];

/// Reads one observation per row from the CSV at `path`, using the column
/// names in `source`.
///
/// Rows with an empty identifier are skipped. Empty and `NA`-style values
/// become `None`.
///
/// # Errors
///
/// * [`CensusError::Io`] if the file cannot be opened
/// * [`CensusError::Csv`] if it cannot be parsed
/// * [`CensusError::Schema`] if a configured column is absent
/// * [`CensusError::Conversion`] if a value is not numeric
pub fn load_long_csv(path: &Path, source: &LongCsvSource) -> Result<Vec<LongRow>, CensusError> {
    let file = std::fs::File::open(path).map_err(|e| CensusError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let csv_error = |e| CensusError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| CensusError::Schema {
                message: format!("{} has no {column:?} column", path.display()),
            })
    };

    let id_col = find(&source.id_column)?;
    let variable_col = find(&source.variable_column)?;
    let value_col = find(&source.value_column)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let field = |i: usize| record.get(i).map_or("", str::trim);

        let id = field(id_col);
        if id.is_empty() {
            skipped += 1;
            continue;
        }

        let raw = field(value_col);
        let value = if MISSING_VALUES.contains(&raw) {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|_| CensusError::Conversion {
                message: format!(
                    "{} row {}: value {raw:?} is not numeric",
                    path.display(),
                    index + 1
                ),
            })?)
        };

        rows.push(LongRow {
            id: id.to_string(),
            variable: field(variable_col).to_string(),
            value,
        });
    }

    if skipped > 0 {
        log::warn!(
            "{}: skipped {skipped} rows without {}",
            path.display(),
            source.id_column
        );
    }
    log::info!("{}: loaded {} observations", path.display(), rows.len());

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_csv(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("collision-map-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("observations.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn source(path: &Path) -> LongCsvSource {
        LongCsvSource {
            path: path.to_path_buf(),
            id_column: "GEOID".to_string(),
            variable_column: "variable".to_string(),
            value_column: "estimate".to_string(),
        }
    }

    #[test]
    fn reads_observations_and_missing_values() {
        let path = write_csv(
            "GEOID,NAME,variable,estimate\n\
             36061000100,Tract 1,B08201_001E,1181\n\
             36061000100,Tract 1,B08201_002E,NA\n\
             ,Orphan,B08201_001E,3\n",
        );
        let rows = load_long_csv(&path, &source(&path)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "36061000100");
        assert_eq!(rows[0].value, Some(1181.0));
        assert_eq!(rows[1].variable, "B08201_002E");
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let path = write_csv("GEOID,variable,value\n1,a,2\n");
        let err = load_long_csv(&path, &source(&path)).unwrap_err();
        assert!(matches!(err, CensusError::Schema { .. }));
    }

    #[test]
    fn non_numeric_value_is_conversion_error() {
        let path = write_csv("GEOID,variable,estimate\n1,a,lots\n");
        let err = load_long_csv(&path, &source(&path)).unwrap_err();
        assert!(matches!(err, CensusError::Conversion { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = PathBuf::from("/definitely/not/here.csv");
        let err = load_long_csv(&path, &source(&path)).unwrap_err();
        assert!(matches!(err, CensusError::Io { .. }));
    }
}

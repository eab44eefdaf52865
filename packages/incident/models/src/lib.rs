#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision point record types.
//!
//! Defines the TOML schema describing a delimited point export and the
//! cleaned point layer produced from it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use collision_map_boundary_models::Crs;
use geo::Point;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How a record's date string is compared with the target year.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DateMatching {
    /// The first four characters of the raw string must equal the year.
    ///
    /// Purely textual: `"20180304"` and `"2018-13-45"` both match `2018`.
    #[default]
    Prefix,
    /// The string must parse as a date whose calendar year equals the year.
    /// Unparseable dates never match.
    Calendar,
}

/// A delimited point export, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSourceConfig {
    /// CSV path. Relative paths are resolved against the data directory.
    pub path: PathBuf,
    /// Column holding the X (easting/longitude) coordinate.
    pub x_column: String,
    /// Column holding the Y (northing/latitude) coordinate.
    pub y_column: String,
    /// Column holding the raw date string.
    pub date_column: String,
    /// Canonical name for the first column, whose header the source export
    /// corrupts (e.g. a byte-order mark glued to `X`).
    #[serde(default)]
    pub repair_first_column: Option<String>,
    /// Four-digit year to retain. No filtering when absent.
    #[serde(default)]
    pub year: Option<String>,
    /// Year comparison mode.
    #[serde(default)]
    pub date_matching: DateMatching,
    /// CRS of the coordinates. Defaults to the neighborhood layer's CRS.
    #[serde(default)]
    pub crs: Option<Crs>,
    /// Field delimiter (default: comma).
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// One cleaned point record.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// 1-based data row number in the source file (header excluded).
    pub source_row: u64,
    /// Point geometry in the layer's CRS.
    pub point: Point<f64>,
    /// Raw date string, as read.
    pub date: String,
    /// Every column of the source row keyed by (repaired) header name.
    pub attributes: BTreeMap<String, String>,
}

/// Row accounting for a cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    /// Data rows read from the file.
    pub total_rows: u64,
    /// Rows missing a required value.
    pub dropped_incomplete: u64,
    /// Rows whose coordinates are not finite numbers.
    pub dropped_invalid_coordinates: u64,
    /// Rows rejected by the year filter.
    pub dropped_other_year: u64,
    /// Rows kept.
    pub retained: u64,
}

/// Cleaned point records under a declared CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLayer {
    /// Reference system of every point.
    pub crs: Crs,
    /// Records in source order.
    pub records: Vec<PointRecord>,
    /// How the records were obtained.
    pub report: CleaningReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: IncidentSourceConfig = toml::from_str(
            r#"
            path = "collisions.csv"
            x_column = "X"
            y_column = "Y"
            date_column = "CRASH_DATE"
            "#,
        )
        .unwrap();

        assert_eq!(config.date_matching, DateMatching::Prefix);
        assert!(config.year.is_none());
        assert!(config.repair_first_column.is_none());
        assert!(config.crs.is_none());
    }

    #[test]
    fn date_matching_parses_snake_case() {
        let config: IncidentSourceConfig = toml::from_str(
            r#"
            path = "collisions.csv"
            x_column = "X"
            y_column = "Y"
            date_column = "CRASH_DATE"
            year = "2018"
            date_matching = "calendar"
            crs = "EPSG:2263"
            "#,
        )
        .unwrap();

        assert_eq!(config.date_matching, DateMatching::Calendar);
        assert_eq!(config.crs.unwrap().code(), "2263");
    }
}

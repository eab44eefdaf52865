#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for external tract attributes.
//!
//! External attributes are either fetched from the Census Bureau's American
//! Community Survey API or read from a long-form CSV already on disk. Both
//! produce one observation per `(GEOID, variable)` pair.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default Census Data API root.
pub const DEFAULT_CENSUS_API_BASE: &str = "https://api.census.gov/data";

fn default_dataset() -> String {
    "acs/acs5".to_string()
}

fn default_id_column() -> String {
    "GEOID".to_string()
}

fn default_variable_column() -> String {
    "variable".to_string()
}

fn default_value_column() -> String {
    "estimate".to_string()
}

/// External attributes joined onto the tract densities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAttributesConfig {
    /// Variables to keep (e.g. `B08201_002E`). For ACS sources these are
    /// also the variables requested.
    pub variables: Vec<String>,
    /// Where the observations come from.
    pub source: ExternalSource,
}

/// Source of long-form observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalSource {
    /// American Community Survey tract-level estimates.
    Acs(AcsQuery),
    /// A CSV with one row per observation.
    LongCsv(LongCsvSource),
}

/// An ACS request for every tract of a state, optionally narrowed to a set
/// of counties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcsQuery {
    /// Survey vintage, e.g. `2018`.
    pub year: u16,
    /// Dataset path below the vintage.
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Two-digit state FIPS code.
    pub state: String,
    /// Three-digit county FIPS codes. Empty means every county.
    #[serde(default)]
    pub counties: Vec<String>,
    /// API root override.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl AcsQuery {
    /// The API root to query.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_CENSUS_API_BASE)
    }

    /// The `in=` geography clause.
    #[must_use]
    pub fn within(&self) -> String {
        let counties = if self.counties.is_empty() {
            "*".to_string()
        } else {
            self.counties.join(",")
        };
        format!("state:{} county:{counties}", self.state)
    }
}

/// Column layout of a long-form observation CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongCsvSource {
    /// CSV path. Relative paths are resolved against the data directory.
    pub path: PathBuf,
    /// Column holding the geography identifier.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Column holding the variable name.
    #[serde(default = "default_variable_column")]
    pub variable_column: String,
    /// Column holding the observed value.
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

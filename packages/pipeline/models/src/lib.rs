#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis definition schema.
//!
//! An analysis definition is a TOML file naming the collision export, the
//! neighborhood layer, the optional census-tract layer, and the optional
//! external attributes to correlate with tract densities. Built-in
//! definitions are embedded in `collision_map_pipeline`; ad-hoc ones are read
//! from disk.

use std::path::PathBuf;

use collision_map_analytics_models::DensityOptions;
use collision_map_boundary_models::BoundaryLayerConfig;
use collision_map_census_models::ExternalAttributesConfig;
use collision_map_incident_models::IncidentSourceConfig;
use collision_map_spatial::SpatialPredicate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Geojson, OutputFormat::Csv]
}

const fn default_clip() -> bool {
    true
}

/// A complete analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisDefinition {
    /// Unique identifier (e.g. `"nyc_collisions_2018"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Directory for written layers. Relative paths are resolved against
    /// the data directory.
    pub output_dir: PathBuf,
    /// Formats each enriched layer is written in.
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    /// Collision point export.
    pub incidents: IncidentSourceConfig,
    /// Primary polygon layer.
    pub neighborhoods: LayerDefinition,
    /// Secondary census-tract layer.
    #[serde(default)]
    pub tracts: Option<TractDefinition>,
    /// Area unit and unmatched-polygon handling for every layer.
    #[serde(default)]
    pub density: DensityOptions,
    /// External attributes correlated with tract densities. Requires
    /// `tracts`.
    #[serde(default)]
    pub census: Option<ExternalAttributesConfig>,
}

impl AnalysisDefinition {
    /// Checks cross-field constraints that the schema alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.census.is_some() && self.tracts.is_none() {
            return Err("census attributes require a tracts layer".to_string());
        }
        if self.formats.is_empty() {
            return Err("at least one output format is required".to_string());
        }
        Ok(())
    }
}

/// A polygon layer and the predicate points are joined with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// How to load the layer.
    pub boundaries: BoundaryLayerConfig,
    /// Point-in-polygon relation.
    #[serde(default)]
    pub predicate: SpatialPredicate,
}

/// The census-tract layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TractDefinition {
    /// How to load the layer.
    pub boundaries: BoundaryLayerConfig,
    /// Point-in-polygon relation.
    #[serde(default)]
    pub predicate: SpatialPredicate,
    /// Keep only tracts intersecting the neighborhood layer.
    #[serde(default = "default_clip")]
    pub clip_to_neighborhoods: bool,
}

/// Output file format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputFormat {
    /// `GeoJSON` `FeatureCollection`.
    Geojson,
    /// CSV with the geometry as a `GeoJSON` string column.
    Csv,
}

impl OutputFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Geojson => "geojson",
            Self::Csv => "csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use collision_map_analytics_models::{AreaUnit, UnmatchedPolicy};

    use super::*;

    const MINIMAL: &str = r#"
id = "demo"
name = "Demo"
output_dir = "output/demo"

[incidents]
path = "collisions.csv"
x_column = "X"
y_column = "Y"
date_column = "DATE"

[neighborhoods]
boundaries = { path = "neighborhoods.geojson", id_field = "name" }
"#;

    #[test]
    fn minimal_definition_uses_defaults() {
        let def: AnalysisDefinition = toml::from_str(MINIMAL).unwrap();
        assert_eq!(def.formats, vec![OutputFormat::Geojson, OutputFormat::Csv]);
        assert_eq!(def.neighborhoods.predicate, SpatialPredicate::Within);
        assert_eq!(def.density.unit, AreaUnit::SquareFeet);
        assert_eq!(def.density.unmatched, UnmatchedPolicy::Keep);
        assert!(def.tracts.is_none());
        assert!(def.census.is_none());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn tracts_clip_by_default() {
        let body = format!(
            "{MINIMAL}\n[tracts]\nboundaries = {{ path = \"tracts.geojson\", id_field = \"GEOID\" }}\n"
        );
        let def: AnalysisDefinition = toml::from_str(&body).unwrap();
        assert!(def.tracts.unwrap().clip_to_neighborhoods);
    }

    #[test]
    fn census_without_tracts_is_invalid() {
        let body = format!(
            "{MINIMAL}\n[census]\nvariables = [\"a\"]\n[census.source]\ntype = \"long_csv\"\npath = \"a.csv\"\n"
        );
        let def: AnalysisDefinition = toml::from_str(&body).unwrap();
        assert!(def.validate().is_err());
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Geojson.extension(), "geojson");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision density analysis pipeline.
//!
//! Runs an [`AnalysisDefinition`] end to end: loads the neighborhood layer
//! and the collision export, joins, counts, and normalizes by area, merges
//! the metrics back onto the polygons, repeats against the census-tract
//! layer, and optionally correlates tract densities with external
//! attributes. Every stage's output is a new value passed explicitly to the
//! next.

pub mod paths;
pub mod registry;
pub mod run;

use std::path::PathBuf;
use std::sync::Arc;

use collision_map_analytics::AnalyticsError;
use collision_map_analytics_models::CorrelationSummary;
use collision_map_boundary::BoundaryError;
use collision_map_census::CensusError;
use collision_map_incident::IncidentError;
use collision_map_incident_models::CleaningReport;
use collision_map_spatial::SpatialError;
use collision_map_spatial::progress::null_progress;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use registry::{all_definitions, find_definition, load_definition_file, parse_definition};
pub use run::run_analysis;

pub use collision_map_pipeline_models::AnalysisDefinition;
pub use collision_map_spatial::progress::ProgressCallback;

/// Pipeline stage, named in errors and progress messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Reading a polygon layer.
    LoadBoundaries,
    /// Reading and cleaning the collision export.
    BuildPoints,
    /// Clipping tracts to the neighborhood footprint.
    Subset,
    /// Point-in-polygon join.
    Join,
    /// Area and density computation.
    Density,
    /// Writing enriched layers.
    Write,
    /// Loading external attributes.
    ExternalAttributes,
}

/// Errors raised while reading analysis definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition file could not be read.
    #[error("Failed to read definition {}: {source}", path.display())]
    Io {
        /// Definition path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML does not match the definition schema.
    #[error("Failed to parse definition {name}: {source}")]
    Parse {
        /// Definition name or path.
        name: String,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A cross-field constraint is violated.
    #[error("Invalid definition {id}: {message}")]
    Invalid {
        /// Definition id.
        id: String,
        /// The violated constraint.
        message: String,
    },
}

/// Errors that abort a pipeline run. Each names the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading or writing a polygon layer failed.
    #[error("{stage} failed for {layer}: {source}")]
    Boundary {
        /// Failing stage.
        stage: Stage,
        /// Layer name.
        layer: String,
        /// Underlying error.
        #[source]
        source: BoundaryError,
    },

    /// Reading the collision export failed.
    #[error("{stage} failed: {source}")]
    Incident {
        /// Failing stage.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: IncidentError,
    },

    /// A spatial operation failed.
    #[error("{stage} failed for {layer}: {source}")]
    Spatial {
        /// Failing stage.
        stage: Stage,
        /// Layer name.
        layer: String,
        /// Underlying error.
        #[source]
        source: SpatialError,
    },

    /// Aggregation, density, or reshaping failed.
    #[error("{stage} failed for {layer}: {source}")]
    Analytics {
        /// Failing stage.
        stage: Stage,
        /// Layer name.
        layer: String,
        /// Underlying error.
        #[source]
        source: AnalyticsError,
    },

    /// Loading external attributes failed.
    #[error("{stage} failed: {source}")]
    Census {
        /// Failing stage.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: CensusError,
    },

    /// Writing a CSV table failed.
    #[error("{stage} failed for {}: {source}", path.display())]
    Csv {
        /// Failing stage.
        stage: Stage,
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// The definition is unusable.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Per-run overrides of the definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Base for relative input and output paths.
    pub data_dir: PathBuf,
    /// Replaces the definition's target year.
    pub year: Option<String>,
    /// Replaces the definition's output directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            data_dir: paths::data_dir(),
            year: None,
            output_dir: None,
        }
    }
}

/// Progress sinks for a run.
#[derive(Clone)]
pub struct PipelineProgress {
    /// Advances once per completed stage.
    pub steps: Arc<dyn ProgressCallback>,
    /// Tracks points within each spatial join.
    pub join: Arc<dyn ProgressCallback>,
}

impl PipelineProgress {
    /// Progress that reports nothing.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            steps: null_progress(),
            join: null_progress(),
        }
    }
}

/// Summary of one enriched polygon layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerReport {
    /// Layer name.
    pub layer: String,
    /// Polygons in the (possibly clipped) layer.
    pub features: usize,
    /// Points that matched at least one polygon.
    pub matched_points: usize,
    /// Points that matched no polygon.
    pub unmatched_points: usize,
    /// Polygons with at least one point.
    pub polygons_with_points: usize,
    /// Files written for this layer.
    pub outputs: Vec<PathBuf>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Definition id.
    pub analysis: String,
    /// Row accounting for the collision export.
    pub cleaning: CleaningReport,
    /// One entry per polygon layer, neighborhoods first.
    pub layers: Vec<LayerReport>,
    /// One entry per external variable with enough data.
    pub correlations: Vec<CorrelationSummary>,
    /// Correlation tables written, if any.
    pub correlation_outputs: Vec<PathBuf>,
}

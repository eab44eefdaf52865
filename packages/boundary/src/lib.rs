#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary layer loading and export.
//!
//! Reads neighborhood and census tract polygons from `GeoJSON`
//! `FeatureCollection` files, normalizes them into [`PolygonLayer`]s keyed by
//! a configured identifier property, and writes enriched layers back out as
//! `GeoJSON` and CSV.
//!
//! [`PolygonLayer`]: collision_map_boundary_models::PolygonLayer

pub mod load;
pub mod write;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing boundary layers.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a usable `GeoJSON` `FeatureCollection`.
    #[error("Failed to load boundary layer {}: {message}", path.display())]
    Load {
        /// Offending file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The layer's declared metadata is inconsistent with its configuration.
    #[error("Schema error in {}: {message}", path.display())]
    Schema {
        /// Offending file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Every feature was dropped during normalization.
    #[error("No valid polygon features in {}", path.display())]
    NoGeometries {
        /// Offending file.
        path: PathBuf,
    },

    /// Two features share an identifier and the layer rejects duplicates.
    #[error("Duplicate identifier {id:?} in {}", path.display())]
    JoinKeyCollision {
        /// Offending file.
        path: PathBuf,
        /// The repeated identifier.
        id: String,
    },

    /// CSV serialization failed.
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

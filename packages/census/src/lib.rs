#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! External tract attributes.
//!
//! Fetches American Community Survey estimates from the Census Data API, or
//! reads the same observations from a long-form CSV, as
//! [`LongRow`](collision_map_analytics_models::LongRow)s keyed by tract
//! GEOID.

pub mod acs;
pub mod long_csv;

pub use acs::{fetch_acs, parse_acs_response};
pub use long_csv::load_long_csv;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading external attributes.
#[derive(Debug, Error)]
pub enum CensusError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File could not be opened.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV parsing failed.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// The file path.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The data lacks an expected column.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what is missing.
        message: String,
    },

    /// A value could not be interpreted.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

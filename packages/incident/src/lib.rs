#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision point loading and cleaning.
//!
//! Reads a delimited collision export, repairs its corrupted first header,
//! drops incomplete rows, keeps only the target year, and packages the
//! survivors as points under a declared CRS.

pub mod build;
pub mod parsing;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building a point layer.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// The file could not be opened or a row could not be parsed.
    #[error("Failed to read {}: {source}", path.display())]
    Load {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// A required column is absent after header repair.
    #[error("Required column {column:?} not found in {}", path.display())]
    Schema {
        /// Offending file.
        path: PathBuf,
        /// The missing column.
        column: String,
    },

    /// The target year is not four ASCII digits.
    #[error("Invalid target year {year:?}: expected four digits")]
    InvalidYear {
        /// The rejected value.
        year: String,
    },

    /// The configured delimiter is not a single byte.
    #[error("Invalid delimiter {delimiter:?}: expected a single ASCII character")]
    InvalidDelimiter {
        /// The rejected value.
        delimiter: String,
    },
}

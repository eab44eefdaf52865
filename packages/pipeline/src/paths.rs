#![allow(clippy::module_name_repetitions)]
//! Canonical locations of input data and written layers.
//!
//! Relative paths in analysis definitions are resolved against the project
//! root's `data/` directory unless the caller supplies another base.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the default `data/` directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Resolves `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Path of one written layer: `<dir>/<analysis>_<layer>.<extension>`.
#[must_use]
pub fn output_path(dir: &Path, analysis_id: &str, layer: &str, extension: &str) -> PathBuf {
    dir.join(format!("{analysis_id}_{layer}.{extension}"))
}

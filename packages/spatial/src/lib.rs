#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial joins between collision points and boundary polygons.
//!
//! Builds R-tree indexes over boundary layers and attaches each point to the
//! polygon containing it. Also provides the polygon-on-polygon subset used to
//! clip census tracts to the neighborhood layer's footprint.

pub mod index;
pub mod join;
pub mod progress;

use collision_map_boundary_models::Crs;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use index::PolygonIndex;
pub use join::{JoinedRecord, join_points, subset_intersecting};

/// Spatial relation a point must have with a polygon to match it.
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
pub enum SpatialPredicate {
    /// The point lies in the polygon's interior. Points on a boundary do not
    /// match. At most one polygon matches per point.
    #[default]
    Within,
    /// The point lies in the interior or on the boundary. A point on a shared
    /// edge matches every polygon touching it.
    Intersects,
}

/// Errors that can occur during spatial joins.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The two inputs are not in the same reference system.
    #[error("CRS mismatch: {left} is in {left_crs} but {right} is in {right_crs}")]
    CrsMismatch {
        /// Name of the first input.
        left: String,
        /// CRS of the first input.
        left_crs: Crs,
        /// Name of the second input.
        right: String,
        /// CRS of the second input.
        right_crs: Crs,
    },
}

/// Fails with [`SpatialError::CrsMismatch`] unless both CRSs are equal.
///
/// # Errors
///
/// Returns [`SpatialError::CrsMismatch`] if `left_crs != right_crs`.
pub fn ensure_same_crs(
    left: &str,
    left_crs: &Crs,
    right: &str,
    right_crs: &Crs,
) -> Result<(), SpatialError> {
    if left_crs == right_crs {
        Ok(())
    } else {
        Err(SpatialError::CrsMismatch {
            left: left.to_string(),
            left_crs: left_crs.clone(),
            right: right.to_string(),
            right_crs: right_crs.clone(),
        })
    }
}

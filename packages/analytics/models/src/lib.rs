#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation, density, and correlation result types.
//!
//! These rows are plain attribute records: none of them carry geometry.
//! Geometry is reattached only by [`MergedFeature`], which pairs a base
//! polygon with its metrics through an explicit identifier join.

use std::collections::BTreeMap;

use collision_map_boundary_models::{
    LinearUnit, PolygonFeature, SQUARE_FEET_PER_SQUARE_METRE, displaced_name,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Square metres in a square mile.
const SQUARE_METRES_PER_SQUARE_MILE: f64 = 2_589_988.110_336;

/// Attribute names appended to exported features.
pub const COUNT_ATTRIBUTE: &str = "count";
/// See [`COUNT_ATTRIBUTE`].
pub const AREA_ATTRIBUTE: &str = "area";
/// See [`COUNT_ATTRIBUTE`].
pub const DENSITY_ATTRIBUTE: &str = "density";
/// Every attribute [`MergedFeature::to_feature`] writes, in write order.
pub const METRIC_ATTRIBUTES: [&str; 3] = [COUNT_ATTRIBUTE, AREA_ATTRIBUTE, DENSITY_ATTRIBUTE];

/// Unit that computed areas are reported in.
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
pub enum AreaUnit {
    /// Square metres.
    SquareMetres,
    /// Square feet, converted at 10.7639 ft² per m².
    #[default]
    SquareFeet,
    /// Square kilometres.
    SquareKilometres,
    /// Square miles.
    SquareMiles,
}

impl AreaUnit {
    /// Converts an area in square metres to this unit.
    #[must_use]
    pub fn from_square_metres(self, square_metres: f64) -> f64 {
        match self {
            Self::SquareMetres => square_metres,
            Self::SquareFeet => square_metres * SQUARE_FEET_PER_SQUARE_METRE,
            Self::SquareKilometres => square_metres / 1_000_000.0,
            Self::SquareMiles => square_metres / SQUARE_METRES_PER_SQUARE_MILE,
        }
    }
}

/// What to do with polygons that no point fell in.
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
pub enum UnmatchedPolicy {
    /// Keep the polygon with null count, area, and density.
    #[default]
    Keep,
    /// Leave the polygon out of the output.
    Drop,
    /// Keep the polygon with a count of zero and a computed area and density.
    Zero,
}

/// Density settings, deserialized from TOML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityOptions {
    /// Reporting unit for areas.
    #[serde(default)]
    pub unit: AreaUnit,
    /// Linear unit to assume for CRSs missing from the built-in table.
    #[serde(default)]
    pub linear_unit: Option<LinearUnit>,
    /// Handling of polygons without points.
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
}

/// Number of points attributed to one polygon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    /// Polygon identifier.
    pub id: String,
    /// Number of joined points.
    pub count: u64,
}

/// Count normalized by polygon area.
///
/// Invariant: `area > 0` and `density == count / area`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityRow {
    /// Polygon identifier.
    pub id: String,
    /// Number of joined points.
    pub count: u64,
    /// Polygon area in `unit`.
    pub area: f64,
    /// Unit of `area`.
    pub unit: AreaUnit,
    /// `count / area`, points per `unit`.
    pub density: f64,
}

/// A base-layer polygon with its metrics, if any point matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFeature<'a> {
    /// The base polygon.
    pub feature: &'a PolygonFeature,
    /// Metrics joined by identifier. `None` means no point matched, which is
    /// distinct from a count of zero.
    pub metrics: Option<DensityRow>,
}

impl MergedFeature<'_> {
    /// Copy of the base feature with `count`, `area`, and `density`
    /// attributes appended (JSON null when there are no metrics).
    ///
    /// A source attribute already using one of those names is moved to a
    /// [`displaced_name`] rather than overwritten.
    #[must_use]
    pub fn to_feature(&self) -> PolygonFeature {
        let mut feature = self.feature.clone();
        let values: [serde_json::Value; 3] = match &self.metrics {
            Some(row) => [row.count.into(), row.area.into(), row.density.into()],
            None => Default::default(),
        };

        for (name, value) in METRIC_ATTRIBUTES.into_iter().zip(values) {
            if let Some(source) = feature.attributes.remove(name) {
                let key = displaced_name(name, |key| feature.attributes.contains_key(key));
                feature.attributes.insert(key, source);
            }
            feature.attributes.insert(name.to_string(), value);
        }
        feature
    }
}

/// One observation of an external dataset in long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongRow {
    /// Geography identifier (e.g. tract GEOID).
    pub id: String,
    /// Variable name (e.g. `B08201_002E`).
    pub variable: String,
    /// Observed value; `None` when the source reports no estimate.
    pub value: Option<f64>,
}

/// All variables of one identifier in wide form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WideRow {
    /// Geography identifier.
    pub id: String,
    /// One entry per requested variable; `None` when missing.
    pub values: BTreeMap<String, Option<f64>>,
}

/// A density joined to external attributes, ready for correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRow {
    /// Geography identifier.
    pub id: String,
    /// Points per area unit.
    pub density: f64,
    /// External variables; `None` when missing.
    pub values: BTreeMap<String, Option<f64>>,
}

/// Linear association between density and one external variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSummary {
    /// External variable name.
    pub variable: String,
    /// Number of rows where the variable is present.
    pub n: usize,
    /// Pearson correlation coefficient.
    pub pearson_r: f64,
    /// Least-squares slope of density on the variable.
    pub slope: f64,
    /// Least-squares intercept.
    pub intercept: f64,
}

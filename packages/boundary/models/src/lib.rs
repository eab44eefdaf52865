#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon boundary layer types.
//!
//! Defines the in-memory representation of a boundary layer (neighborhoods,
//! census tracts), the coordinate reference system descriptor shared by
//! every spatial operation, and the TOML schema describing how a layer is
//! read from disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Fixed conversion factor between square metres and square feet.
pub const SQUARE_FEET_PER_SQUARE_METRE: f64 = 10.7639;

/// Prefix that keeps a source attribute when an output column of the same
/// name is written over it.
pub const SOURCE_PREFIX: &str = "source_";

/// State Plane zones published in US survey feet.
const US_SURVEY_FOOT_CODES: &[u32] = &[
    2226, 2227, 2228, 2229, 2230, 2232, 2234, 2236, 2248, 2249, 2260, 2263, 2271, 2272, 2276, 2278,
    2285, 2286, 3424, 3435, 3436,
];

/// Metre-based projections outside the UTM ranges.
const METRE_CODES: &[u32] = &[3857, 3395, 2154, 27700, 32118];

/// A coordinate reference system identified by authority and code
/// (e.g. `EPSG:2263`).
///
/// Serializes as its `AUTHORITY:CODE` string so it can be written directly
/// in TOML definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    authority: String,
    code: String,
}

impl Crs {
    /// WGS84 longitude/latitude, the implicit CRS of RFC 7946 `GeoJSON`.
    #[must_use]
    pub fn wgs84() -> Self {
        Self {
            authority: "EPSG".to_string(),
            code: "4326".to_string(),
        }
    }

    /// Parses a CRS name in any of the forms found in `GeoJSON` files and
    /// configuration:
    ///
    /// * `EPSG:2263`
    /// * `urn:ogc:def:crs:EPSG::2263`
    /// * `urn:ogc:def:crs:OGC:1.3:CRS84` (normalized to `EPSG:4326`)
    ///
    /// Returns `None` if the name has no authority or code.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let lower = name.to_ascii_lowercase();

        let (authority, code) = if lower.starts_with("urn:ogc:def:crs:") {
            let rest = &name["urn:ogc:def:crs:".len()..];
            let mut parts = rest.split(':');
            let authority = parts.next()?;
            let code = rest.rsplit(':').find(|s| !s.is_empty())?;
            (authority, code)
        } else {
            name.split_once(':')?
        };

        let authority = authority.trim().to_ascii_uppercase();
        let code = code.trim();
        if authority.is_empty() || code.is_empty() || code.eq_ignore_ascii_case(&authority) {
            return None;
        }

        if authority == "OGC" && code.eq_ignore_ascii_case("CRS84") {
            return Some(Self::wgs84());
        }

        Some(Self {
            authority,
            code: code.to_string(),
        })
    }

    /// The authority name (e.g. `"EPSG"`).
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The authority-specific code (e.g. `"2263"`).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Classifies this CRS from a built-in table of common EPSG codes.
    ///
    /// Anything outside the table is [`CrsKind::Unknown`]; area computations
    /// on such layers require an explicit linear unit.
    #[must_use]
    pub fn kind(&self) -> CrsKind {
        if self.authority != "EPSG" {
            return CrsKind::Unknown;
        }
        let Ok(code) = self.code.parse::<u32>() else {
            return CrsKind::Unknown;
        };

        match code {
            4326 | 4269 | 4267 | 4258 | 4283 | 4617 | 4979 => CrsKind::Geographic,
            _ if US_SURVEY_FOOT_CODES.contains(&code) => {
                CrsKind::Projected(LinearUnit::UsSurveyFoot)
            }
            _ if METRE_CODES.contains(&code) => CrsKind::Projected(LinearUnit::Metre),
            26901..=26923 | 32601..=32660 | 32701..=32760 => CrsKind::Projected(LinearUnit::Metre),
            _ => CrsKind::Unknown,
        }
    }

    /// The URN form used in the legacy `GeoJSON` `crs` member.
    #[must_use]
    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:{}::{}", self.authority, self.code)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl TryFrom<String> for Crs {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid CRS name: {value:?}"))
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Whether a CRS stores angles or planar lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees.
    Geographic,
    /// Planar coordinates in the given linear unit.
    Projected(LinearUnit),
    /// Not in the built-in table.
    Unknown,
}

/// Linear unit of a projected CRS.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinearUnit {
    /// SI metre.
    Metre,
    /// US survey foot (state plane coordinate systems).
    UsSurveyFoot,
}

impl LinearUnit {
    /// Square metres covered by one square unit.
    #[must_use]
    pub const fn square_metres_per_square_unit(self) -> f64 {
        match self {
            Self::Metre => 1.0,
            Self::UsSurveyFoot => 1.0 / SQUARE_FEET_PER_SQUARE_METRE,
        }
    }
}

/// The name a source attribute called `name` is kept under once an output
/// column takes its place: `source_<name>`, prefixed again while `taken`
/// reports a clash.
#[must_use]
pub fn displaced_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = format!("{SOURCE_PREFIX}{name}");
    while taken(&candidate) {
        candidate.insert_str(0, SOURCE_PREFIX);
    }
    candidate
}

/// A single boundary polygon with its identifier and attribute table row.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    /// Join key (neighborhood name, tract GEOID). Never empty.
    pub id: String,
    /// Boundary geometry. Single polygons are stored as one-part
    /// multipolygons.
    pub geometry: MultiPolygon<f64>,
    /// Original feature properties.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// A loaded boundary layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonLayer {
    /// Layer name used in logs and output file names.
    pub name: String,
    /// Reference system of every geometry in the layer.
    pub crs: Crs,
    /// Features in file order, identifiers unique.
    pub features: Vec<PolygonFeature>,
}

impl PolygonLayer {
    /// Number of features in the layer.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Index of features by identifier.
    #[must_use]
    pub fn by_id(&self) -> BTreeMap<&str, &PolygonFeature> {
        self.features
            .iter()
            .map(|feature| (feature.id.as_str(), feature))
            .collect()
    }
}

/// What to do when several features share an identifier.
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
pub enum DuplicatePolicy {
    /// Fail the load with a join key collision.
    #[default]
    Reject,
    /// Merge all parts of an identifier into a single multipolygon,
    /// keeping the first feature's attributes.
    Dissolve,
}

/// How to read a boundary layer, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryLayerConfig {
    /// `GeoJSON` `FeatureCollection` path. Relative paths are resolved
    /// against the data directory.
    pub path: PathBuf,
    /// Property holding the feature identifier.
    pub id_field: String,
    /// Duplicate identifier handling.
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// CRS to assume when the file carries no `crs` member.
    #[serde(default)]
    pub crs: Option<Crs>,
}

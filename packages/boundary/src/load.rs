//! Normalizes `GeoJSON` features into a [`PolygonLayer`].
//!
//! Uses the layer's [`BoundaryLayerConfig`] to extract the identifier from
//! each feature, regardless of the source-specific property naming. Features
//! without an identifier or without a valid areal geometry are dropped before
//! the identifier is ever used as a join key.

use std::collections::BTreeMap;
use std::path::Path;

use collision_map_boundary_models::{
    BoundaryLayerConfig, Crs, DuplicatePolicy, PolygonFeature, PolygonLayer,
};
use geo::{BooleanOps as _, MultiPolygon, Validation as _};
use geojson::{Feature, GeoJson, JsonObject};

use crate::BoundaryError;

/// Why a feature was left out of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SkipReason {
    MissingId,
    MissingGeometry,
    NonAreal,
    Invalid,
}

impl SkipReason {
    const fn label(self) -> &'static str {
        match self {
            Self::MissingId => "missing identifier",
            Self::MissingGeometry => "missing geometry",
            Self::NonAreal => "non-polygon geometry",
            Self::Invalid => "invalid geometry",
        }
    }
}

/// Reads and normalizes a boundary layer from a `GeoJSON` file.
///
/// # Errors
///
/// * [`BoundaryError::Io`] if the file cannot be read
/// * [`BoundaryError::Load`] if it is not a `GeoJSON` `FeatureCollection`
/// * [`BoundaryError::Schema`] if its `crs` member is unusable or contradicts
///   the configured CRS, or if dissolving duplicates yields invalid geometry
/// * [`BoundaryError::JoinKeyCollision`] if identifiers repeat and the layer
///   rejects duplicates
/// * [`BoundaryError::NoGeometries`] if no feature survives normalization
pub fn load_layer(
    name: &str,
    path: &Path,
    config: &BoundaryLayerConfig,
) -> Result<PolygonLayer, BoundaryError> {
    log::info!("{name}: loading boundaries from {}", path.display());

    let body = std::fs::read_to_string(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_layer(name, path, &body, config)
}

/// Normalizes an already-read `GeoJSON` document. `path` is only used for
/// error messages.
///
/// # Errors
///
/// Same as [`load_layer`], minus I/O failures.
pub fn parse_layer(
    name: &str,
    path: &Path,
    body: &str,
    config: &BoundaryLayerConfig,
) -> Result<PolygonLayer, BoundaryError> {
    let geojson: GeoJson = body
        .parse()
        .map_err(|e: geojson::Error| BoundaryError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(BoundaryError::Load {
            path: path.to_path_buf(),
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let crs = resolve_crs(
        path,
        collection.foreign_members.as_ref(),
        config.crs.as_ref(),
    )?;

    let total = collection.features.len();
    let mut skipped: BTreeMap<SkipReason, usize> = BTreeMap::new();
    let mut features = Vec::with_capacity(total);

    for (index, feature) in collection.features.into_iter().enumerate() {
        match normalize_feature(feature, &config.id_field) {
            Ok(feature) => features.push(feature),
            Err(reason) => {
                log::debug!("{name}: skipping feature #{index}: {}", reason.label());
                *skipped.entry(reason).or_default() += 1;
            }
        }
    }

    for (reason, count) in &skipped {
        log::warn!(
            "{name}: dropped {count} of {total} features ({})",
            reason.label()
        );
    }

    let features = resolve_duplicates(name, path, features, config.duplicates)?;

    if features.is_empty() {
        return Err(BoundaryError::NoGeometries {
            path: path.to_path_buf(),
        });
    }

    log::info!(
        "{name}: loaded {} boundaries from {total} features (CRS {crs})",
        features.len()
    );

    Ok(PolygonLayer {
        name: name.to_string(),
        crs,
        features,
    })
}

/// Determines the layer CRS from the file's legacy `crs` member and the
/// configured fallback. A file without a member and without configuration
/// is WGS84 per RFC 7946.
fn resolve_crs(
    path: &Path,
    foreign_members: Option<&JsonObject>,
    configured: Option<&Crs>,
) -> Result<Crs, BoundaryError> {
    let declared = declared_crs(foreign_members).map_err(|message| BoundaryError::Schema {
        path: path.to_path_buf(),
        message,
    })?;

    match (declared, configured) {
        (Some(declared), Some(configured)) if &declared != configured => {
            Err(BoundaryError::Schema {
                path: path.to_path_buf(),
                message: format!("file declares CRS {declared} but {configured} was configured"),
            })
        }
        (Some(declared), _) => Ok(declared),
        (None, Some(configured)) => Ok(configured.clone()),
        (None, None) => Ok(Crs::wgs84()),
    }
}

/// Reads a named CRS from `{"crs": {"type": "name", "properties": {"name": ...}}}`.
fn declared_crs(foreign_members: Option<&JsonObject>) -> Result<Option<Crs>, String> {
    let Some(member) = foreign_members.and_then(|members| members.get("crs")) else {
        return Ok(None);
    };
    if member.is_null() {
        return Ok(None);
    }

    let name = member
        .get("properties")
        .and_then(|props| props.get("name"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| format!("unsupported crs member: {member}"))?;

    Crs::parse(name)
        .map(Some)
        .ok_or_else(|| format!("unrecognized CRS name {name:?}"))
}

/// Normalizes a single `GeoJSON` feature.
fn normalize_feature(feature: Feature, id_field: &str) -> Result<PolygonFeature, SkipReason> {
    let attributes = feature.properties.unwrap_or_default();

    let id = attributes
        .get(id_field)
        .and_then(identifier_value)
        .ok_or(SkipReason::MissingId)?;

    let geometry = feature.geometry.ok_or(SkipReason::MissingGeometry)?;
    let geometry: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|_| SkipReason::MissingGeometry)?;

    let multi_polygon = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => return Err(SkipReason::NonAreal),
    };

    if multi_polygon.0.is_empty() {
        return Err(SkipReason::MissingGeometry);
    }
    if !multi_polygon.is_valid() {
        return Err(SkipReason::Invalid);
    }

    Ok(PolygonFeature {
        id,
        geometry: multi_polygon,
        attributes,
    })
}

/// Identifiers may be stored as strings or numbers (tract codes often are).
fn identifier_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Applies the layer's [`DuplicatePolicy`], preserving first-seen order.
///
/// Dissolved parts are unioned, so shared boundaries disappear and
/// overlapping parts are only counted once.
fn resolve_duplicates(
    name: &str,
    path: &Path,
    features: Vec<PolygonFeature>,
    policy: DuplicatePolicy,
) -> Result<Vec<PolygonFeature>, BoundaryError> {
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    let mut resolved: Vec<PolygonFeature> = Vec::with_capacity(features.len());
    let mut dissolved = 0usize;

    for feature in features {
        if let Some(&position) = positions.get(&feature.id) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(BoundaryError::JoinKeyCollision {
                        path: path.to_path_buf(),
                        id: feature.id,
                    });
                }
                DuplicatePolicy::Dissolve => {
                    let first = &mut resolved[position];
                    first.geometry = first.geometry.union(&feature.geometry);
                    if !first.geometry.is_valid() {
                        return Err(BoundaryError::Schema {
                            path: path.to_path_buf(),
                            message: format!("dissolving {} gave invalid geometry", feature.id),
                        });
                    }
                    dissolved += 1;
                }
            }
        } else {
            positions.insert(feature.id.clone(), resolved.len());
            resolved.push(feature);
        }
    }

    if dissolved > 0 {
        log::info!("{name}: dissolved {dissolved} duplicate features into their first occurrence");
    }

    Ok(resolved)
}

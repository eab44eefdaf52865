//! Export of enriched boundary layers.
//!
//! Both writers overwrite any existing file at the target path and create
//! missing parent directories.

use std::collections::BTreeSet;
use std::path::Path;

use collision_map_boundary_models::{Crs, PolygonFeature, displaced_name};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};

use crate::BoundaryError;

/// CSV column holding the feature identifier.
pub const ID_COLUMN: &str = "id";
/// CSV column holding the `GeoJSON` geometry.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Writes features as a `GeoJSON` `FeatureCollection`.
///
/// Non-WGS84 layers carry a legacy `crs` member so the file reloads with the
/// same reference system.
///
/// # Errors
///
/// Returns [`BoundaryError::Io`] if the file cannot be written.
pub fn write_geojson(
    path: &Path,
    crs: &Crs,
    features: &[PolygonFeature],
) -> Result<(), BoundaryError> {
    let features = features
        .iter()
        .map(|feature| Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&feature.geometry))),
            id: Some(geojson::feature::Id::String(feature.id.clone())),
            properties: Some(feature.attributes.clone()),
            foreign_members: None,
        })
        .collect::<Vec<_>>();
    let count = features.len();

    let foreign_members = (crs != &Crs::wgs84()).then(|| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": crs.urn() },
            }),
        );
        members
    });

    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    });

    ensure_parent_dir(path)?;
    std::fs::write(path, collection.to_string()).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {count} features to {}", path.display());

    Ok(())
}

/// Writes features as CSV: `id`, every attribute column (sorted), then the
/// geometry serialized as a `GeoJSON` geometry object.
///
/// Attributes named `id` or `geometry` are written under a
/// [`displaced_name`] so the header never repeats a column.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the file cannot be created or a row cannot
/// be serialized.
pub fn write_csv(path: &Path, features: &[PolygonFeature]) -> Result<(), BoundaryError> {
    let columns: BTreeSet<&str> = features
        .iter()
        .flat_map(|feature| feature.attributes.keys().map(String::as_str))
        .collect();

    let headings: Vec<String> = columns
        .iter()
        .map(|column| heading(column, &columns))
        .collect();
    for (column, renamed) in columns.iter().zip(&headings) {
        if *column != renamed.as_str() {
            log::warn!(
                "{}: attribute {column:?} written as {renamed:?}",
                path.display()
            );
        }
    }

    ensure_parent_dir(path)?;
    let csv_error = |source| BoundaryError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    let mut header = Vec::with_capacity(headings.len() + 2);
    header.push(ID_COLUMN.to_string());
    header.extend(headings);
    header.push(GEOMETRY_COLUMN.to_string());
    writer.write_record(&header).map_err(csv_error)?;

    for feature in features {
        let mut row = Vec::with_capacity(header.len());
        row.push(feature.id.clone());
        for column in &columns {
            row.push(cell_value(feature.attributes.get(*column)));
        }
        let geometry = Geometry::new(geojson::Value::from(&feature.geometry));
        row.push(serde_json::to_string(&geometry)?);
        writer.write_record(&row).map_err(csv_error)?;
    }

    writer.flush().map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {} rows to {}", features.len(), path.display());

    Ok(())
}

/// CSV heading for the attribute `column`, moved aside when it would repeat
/// the `id` or `geometry` column.
fn heading(column: &str, columns: &BTreeSet<&str>) -> String {
    if column == ID_COLUMN || column == GEOMETRY_COLUMN {
        displaced_name(column, |name| columns.contains(name))
    } else {
        column.to_string()
    }
}

/// Renders an attribute for a CSV cell. Missing and null values are empty.
fn cell_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Ensures the parent directory of `path` exists.
fn ensure_parent_dir(path: &Path) -> Result<(), BoundaryError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| BoundaryError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

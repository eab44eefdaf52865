//! Polygon areas and count densities.

use collision_map_analytics_models::{AggregateRow, AreaUnit, DensityOptions, DensityRow};
use collision_map_boundary_models::{Crs, CrsKind, LinearUnit, PolygonLayer};
use geo::orient::{Direction, Orient as _};
use geo::{Area as _, GeodesicArea as _, MultiPolygon};

use crate::AnalyticsError;

/// Area of `geometry` in `unit`.
///
/// Geographic layers are measured on the WGS84 ellipsoid, whatever the ring
/// winding of the source file. Projected layers are measured in the plane and
/// converted from the CRS's linear unit; a CRS outside the built-in table
/// needs `linear_unit`.
///
/// # Errors
///
/// Returns [`AnalyticsError::UnsupportedCrs`] if the CRS is unknown and no
/// linear unit is given.
pub fn polygon_area(
    geometry: &MultiPolygon<f64>,
    crs: &Crs,
    unit: AreaUnit,
    linear_unit: Option<LinearUnit>,
) -> Result<f64, AnalyticsError> {
    let square_metres = match (crs.kind(), linear_unit) {
        (CrsKind::Geographic, _) => {
            // Geodesic area follows winding: a clockwise exterior measures
            // the rest of the globe.
            geometry.orient(Direction::Default).geodesic_area_unsigned()
        }
        (CrsKind::Projected(unit), _) | (CrsKind::Unknown, Some(unit)) => {
            geometry.unsigned_area() * unit.square_metres_per_square_unit()
        }
        (CrsKind::Unknown, None) => {
            return Err(AnalyticsError::UnsupportedCrs { crs: crs.clone() });
        }
    };

    Ok(unit.from_square_metres(square_metres))
}

/// Builds a density row, `count / area`.
///
/// # Errors
///
/// Returns [`AnalyticsError::DegenerateGeometry`] if `area` is zero,
/// negative, or not finite.
pub fn density(
    id: &str,
    count: u64,
    area: f64,
    unit: AreaUnit,
) -> Result<DensityRow, AnalyticsError> {
    if !area.is_finite() || area <= 0.0 {
        return Err(AnalyticsError::DegenerateGeometry {
            id: id.to_string(),
            area,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let density = count as f64 / area;

    Ok(DensityRow {
        id: id.to_string(),
        count,
        area,
        unit,
        density,
    })
}

/// Computes one density row per aggregate row, in input order.
///
/// # Errors
///
/// * [`AnalyticsError::UnknownIdentifier`] if a row names no layer polygon
/// * [`AnalyticsError::UnsupportedCrs`] if the layer CRS has no known unit
/// * [`AnalyticsError::DegenerateGeometry`] if a polygon has no area
pub fn compute_densities(
    layer: &PolygonLayer,
    rows: &[AggregateRow],
    options: &DensityOptions,
) -> Result<Vec<DensityRow>, AnalyticsError> {
    let by_id = layer.by_id();

    let densities = rows
        .iter()
        .map(|row| {
            let feature = by_id
                .get(row.id.as_str())
                .ok_or_else(|| AnalyticsError::UnknownIdentifier { id: row.id.clone() })?;
            let area = polygon_area(
                &feature.geometry,
                &layer.crs,
                options.unit,
                options.linear_unit,
            )?;
            density(&row.id, row.count, area, options.unit)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "{}: computed {} densities in points per {}",
        layer.name,
        densities.len(),
        options.unit
    );

    Ok(densities)
}

//! External attribute reshaping, joining, and correlation.

use std::collections::{BTreeMap, BTreeSet};

use collision_map_analytics_models::{
    CorrelationRow, CorrelationSummary, DensityRow, LongRow, WideRow,
};

use crate::AnalyticsError;

/// Minimum number of paired observations for a correlation.
const MIN_PAIRS: usize = 3;

/// Reshapes long-form observations into one row per identifier.
///
/// Every output row holds an entry for each of `variables` (or, when
/// `variables` is empty, each variable observed anywhere), `None` where the
/// identifier has no observation. Rows are sorted by identifier.
///
/// # Errors
///
/// Returns [`AnalyticsError::DuplicateObservation`] if an `(id, variable)`
/// pair occurs more than once.
pub fn pivot_wider(rows: &[LongRow], variables: &[String]) -> Result<Vec<WideRow>, AnalyticsError> {
    let columns: BTreeSet<&str> = if variables.is_empty() {
        rows.iter().map(|row| row.variable.as_str()).collect()
    } else {
        variables.iter().map(String::as_str).collect()
    };

    let mut wide: BTreeMap<&str, BTreeMap<String, Option<f64>>> = BTreeMap::new();
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();

    for row in rows {
        let values = wide.entry(row.id.as_str()).or_insert_with(|| {
            columns
                .iter()
                .map(|variable| ((*variable).to_string(), None))
                .collect()
        });

        if !columns.contains(row.variable.as_str()) {
            continue;
        }

        if !seen.insert((row.id.as_str(), row.variable.as_str())) {
            return Err(AnalyticsError::DuplicateObservation {
                id: row.id.clone(),
                variable: row.variable.clone(),
            });
        }
        values.insert(row.variable.clone(), row.value);
    }

    log::debug!(
        "Pivoted {} observations into {} rows x {} variables",
        rows.len(),
        wide.len(),
        columns.len()
    );

    Ok(wide
        .into_iter()
        .map(|(id, values)| WideRow {
            id: id.to_string(),
            values,
        })
        .collect())
}

/// Left-joins external attributes onto density rows by identifier.
///
/// Every density row is kept; identifiers with no external row get `None`
/// for every variable.
#[must_use]
pub fn join_external(
    densities: &[DensityRow],
    external: &[WideRow],
    variables: &[String],
) -> Vec<CorrelationRow> {
    let by_id: BTreeMap<&str, &WideRow> =
        external.iter().map(|row| (row.id.as_str(), row)).collect();

    let mut missing = 0usize;
    let joined = densities
        .iter()
        .map(|density| {
            let wide = by_id.get(density.id.as_str());
            if wide.is_none() {
                missing += 1;
            }
            let values = variables
                .iter()
                .map(|variable| {
                    let value = wide
                        .and_then(|row| row.values.get(variable))
                        .copied()
                        .flatten();
                    (variable.clone(), value)
                })
                .collect();

            CorrelationRow {
                id: density.id.clone(),
                density: density.density,
                values,
            }
        })
        .collect();

    if missing > 0 {
        log::warn!(
            "{missing} of {} density rows have no external attributes",
            densities.len()
        );
    }

    joined
}

/// Pearson correlation and least-squares fit of density on `variable`.
///
/// Only rows where `variable` is present take part. Returns `None` when
/// fewer than three pairs remain or either side has zero variance.
#[must_use]
pub fn correlate(rows: &[CorrelationRow], variable: &str) -> Option<CorrelationSummary> {
    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            row.values
                .get(variable)
                .copied()
                .flatten()
                .filter(|x| x.is_finite())
                .map(|x| (x, row.density))
        })
        .collect();

    if pairs.len() < MIN_PAIRS {
        log::debug!("{variable}: only {} paired observations", pairs.len());
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, syy, sxy) = pairs.iter().fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (dx.mul_add(dx, sxx), dy.mul_add(dy, syy), dx.mul_add(dy, sxy))
    });

    if sxx <= 0.0 || syy <= 0.0 {
        log::debug!("{variable}: zero variance");
        return None;
    }

    let slope = sxy / sxx;

    Some(CorrelationSummary {
        variable: variable.to_string(),
        n: pairs.len(),
        pearson_r: sxy / (sxx * syy).sqrt(),
        slope,
        intercept: slope.mul_add(-mean_x, mean_y),
    })
}

#[cfg(test)]
mod tests {
    use collision_map_analytics_models::AreaUnit;

    use super::*;

    fn long(id: &str, variable: &str, value: Option<f64>) -> LongRow {
        LongRow {
            id: id.to_string(),
            variable: variable.to_string(),
            value,
        }
    }

    fn density_row(id: &str, density: f64) -> DensityRow {
        DensityRow {
            id: id.to_string(),
            count: 1,
            area: 1.0,
            unit: AreaUnit::SquareFeet,
            density,
        }
    }

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn reshapes_long_rows_into_wide_rows() {
        let rows = vec![
            long("t1", "households", Some(100.0)),
            long("t1", "no_vehicle", Some(40.0)),
            long("t2", "households", Some(80.0)),
        ];

        let wide = pivot_wider(&rows, &vars(&["households", "no_vehicle"])).unwrap();
        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0].id, "t1");
        assert_eq!(wide[0].values["households"], Some(100.0));
        assert_eq!(wide[0].values["no_vehicle"], Some(40.0));
        assert_eq!(wide[1].id, "t2");
        assert_eq!(wide[1].values["households"], Some(80.0));
        assert_eq!(wide[1].values["no_vehicle"], None);
    }

    #[test]
    fn empty_variable_list_uses_every_observed_variable() {
        let rows = vec![long("t1", "a", Some(1.0)), long("t2", "b", Some(2.0))];
        let wide = pivot_wider(&rows, &[]).unwrap();
        assert_eq!(wide[0].values.len(), 2);
        assert_eq!(wide[0].values["b"], None);
    }

    #[test]
    fn unrequested_variables_are_ignored() {
        let rows = vec![long("t1", "a", Some(1.0)), long("t1", "z", Some(9.0))];
        let wide = pivot_wider(&rows, &vars(&["a"])).unwrap();
        assert_eq!(wide[0].values.len(), 1);
    }

    #[test]
    fn duplicate_observation_is_rejected() {
        let rows = vec![long("t1", "a", Some(1.0)), long("t1", "a", Some(2.0))];
        let err = pivot_wider(&rows, &[]).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::DuplicateObservation { ref id, ref variable }
                if id == "t1" && variable == "a"
        ));
    }

    #[test]
    fn join_keeps_rows_without_external_attributes() {
        let densities = vec![density_row("t1", 2.0), density_row("t9", 3.0)];
        let wide = pivot_wider(&[long("t1", "a", Some(5.0))], &[]).unwrap();

        let joined = join_external(&densities, &wide, &vars(&["a"]));
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].values["a"], Some(5.0));
        assert_eq!(joined[1].id, "t9");
        assert_eq!(joined[1].values["a"], None);
        assert!((joined[1].density - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn perfect_linear_relation_has_unit_correlation() {
        let rows: Vec<CorrelationRow> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| CorrelationRow {
                id: format!("t{i}"),
                density: 2.0f64.mul_add(x, 1.0),
                values: BTreeMap::from([("a".to_string(), Some(x))]),
            })
            .collect();

        let summary = correlate(&rows, "a").unwrap();
        assert_eq!(summary.n, 4);
        assert!((summary.pearson_r - 1.0).abs() < 1e-12);
        assert!((summary.slope - 2.0).abs() < 1e-12);
        assert!((summary.intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_values_are_skipped_and_small_samples_give_none() {
        let row = |id: &str, density: f64, value: Option<f64>| CorrelationRow {
            id: id.to_string(),
            density,
            values: BTreeMap::from([("a".to_string(), value)]),
        };
        let rows = vec![
            row("t1", 1.0, Some(1.0)),
            row("t2", 2.0, None),
            row("t3", 3.0, Some(3.0)),
        ];
        assert!(correlate(&rows, "a").is_none());
        assert!(correlate(&rows, "unknown").is_none());
    }

    #[test]
    fn constant_variable_gives_none() {
        let rows: Vec<CorrelationRow> = (0..4)
            .map(|i| CorrelationRow {
                id: format!("t{i}"),
                density: f64::from(i),
                values: BTreeMap::from([("a".to_string(), Some(7.0))]),
            })
            .collect();
        assert!(correlate(&rows, "a").is_none());
    }
}

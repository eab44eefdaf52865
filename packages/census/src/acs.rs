//! American Community Survey estimates from the Census Data API.

use collision_map_analytics_models::LongRow;
use collision_map_census_models::AcsQuery;
use serde_json::Value;

use crate::CensusError;

/// Environment variable holding an optional Census API key.
pub const CENSUS_API_KEY_VAR: &str = "CENSUS_API_KEY";

/// Annotation values the API returns in place of an estimate (e.g. too few
/// sample observations, not applicable).
const ANNOTATION_SENTINELS: &[f64] = &[
    -111_111_111.0,
    -222_222_222.0,
    -333_333_333.0,
    -555_555_555.0,
    -666_666_666.0,
    -888_888_888.0,
    -999_999_999.0,
];

/// Fetches `variables` for every tract matched by `query`.
///
/// Appends `CENSUS_API_KEY` from the environment when set; no key is needed
/// for small request volumes.
///
/// # Errors
///
/// * [`CensusError::Http`] if the request fails or returns an error status
/// * [`CensusError::Json`] if the body is not an array of arrays
/// * [`CensusError::Schema`] if a geography or variable column is missing
pub async fn fetch_acs(
    client: &reqwest::Client,
    query: &AcsQuery,
    variables: &[String],
) -> Result<Vec<LongRow>, CensusError> {
    if variables.is_empty() {
        return Err(CensusError::Schema {
            message: "ACS request needs at least one variable".to_string(),
        });
    }

    let url = format!("{}/{}/{}", query.base_url(), query.year, query.dataset);
    let mut params = vec![
        ("get", variables.join(",")),
        ("for", "tract:*".to_string()),
        ("in", query.within()),
    ];
    if let Ok(key) = std::env::var(CENSUS_API_KEY_VAR)
        && !key.is_empty()
    {
        params.push(("key", key));
    }

    log::info!(
        "Fetching {} ACS variables for {} ({} {})...",
        variables.len(),
        query.within(),
        query.year,
        query.dataset
    );

    let resp = client
        .get(&url)
        .query(&params)
        .send()
        .await?
        .error_for_status()?;
    let body = resp.text().await?;

    let rows = parse_acs_response(&body, variables)?;
    log::info!("Fetched {} ACS observations", rows.len());

    Ok(rows)
}

/// Parses an ACS response body into long-form rows.
///
/// The body is a JSON array of arrays whose first row is the header:
///
/// ```text
/// [["B08201_001E","state","county","tract"],
///  ["1181","36","061","000100"], ...]
/// ```
///
/// The GEOID is the concatenation of state, county, and tract codes. Null
/// cells and annotation sentinels become `None`.
///
/// # Errors
///
/// * [`CensusError::Json`] if the body is not an array of arrays
/// * [`CensusError::Schema`] if the header lacks a requested column
/// * [`CensusError::Conversion`] if an estimate is not numeric
pub fn parse_acs_response(body: &str, variables: &[String]) -> Result<Vec<LongRow>, CensusError> {
    let table: Vec<Vec<Value>> = serde_json::from_str(body)?;
    let Some((header, data)) = table.split_first() else {
        return Err(CensusError::Schema {
            message: "ACS response has no header row".to_string(),
        });
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.as_str() == Some(name))
            .ok_or_else(|| CensusError::Schema {
                message: format!("ACS response has no {name:?} column"),
            })
    };

    let state = column("state")?;
    let county = column("county")?;
    let tract = column("tract")?;
    let variable_columns = variables
        .iter()
        .map(|variable| column(variable.as_str()).map(|i| (variable.as_str(), i)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(data.len() * variables.len());
    for record in data {
        let text = |i: usize| record.get(i).and_then(Value::as_str).unwrap_or("");
        let geoid = format!("{}{}{}", text(state), text(county), text(tract));

        for &(variable, i) in &variable_columns {
            let value = record
                .get(i)
                .map(|cell| parse_estimate(cell, &geoid, variable))
                .transpose()?
                .flatten();
            rows.push(LongRow {
                id: geoid.clone(),
                variable: variable.to_string(),
                value,
            });
        }
    }

    Ok(rows)
}

#[allow(clippy::float_cmp)]
fn parse_estimate(cell: &Value, geoid: &str, variable: &str) -> Result<Option<f64>, CensusError> {
    let value = match cell {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let value = value.ok_or_else(|| CensusError::Conversion {
        message: format!("{variable} for {geoid} is not numeric: {cell}"),
    })?;

    if ANNOTATION_SENTINELS.iter().any(|s| *s == value) {
        return Ok(None);
    }

    Ok(Some(value))
}

//! End-to-end execution of an analysis definition.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use collision_map_analytics::{
    compute_densities, correlate, count_by_polygon, join_external, merge_layer, pivot_wider,
    with_zero_counts,
};
use collision_map_analytics_models::{
    CorrelationRow, CorrelationSummary, DensityOptions, DensityRow, LongRow, UnmatchedPolicy,
};
use collision_map_boundary::load::load_layer;
use collision_map_boundary::write::{write_csv, write_geojson};
use collision_map_boundary_models::{BoundaryLayerConfig, PolygonFeature, PolygonLayer};
use collision_map_census::{CensusError, fetch_acs, load_long_csv};
use collision_map_census_models::{ExternalAttributesConfig, ExternalSource};
use collision_map_incident::build::build_point_layer;
use collision_map_incident_models::PointLayer;
use collision_map_pipeline_models::{AnalysisDefinition, OutputFormat};
use collision_map_spatial::progress::ProgressCallback;
use collision_map_spatial::{SpatialPredicate, join_points, subset_intersecting};

use crate::paths::{output_path, resolve};
use crate::{AnalysisReport, LayerReport, PipelineError, PipelineProgress, RunOptions, Stage};

const NEIGHBORHOODS: &str = "neighborhoods";
const TRACTS: &str = "tracts";

/// User-Agent sent to the Census Data API.
const USER_AGENT: &str = concat!("collision-map/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every layer of a run.
struct LayerContext<'a> {
    analysis_id: &'a str,
    output_dir: &'a Path,
    density: &'a DensityOptions,
    formats: &'a [OutputFormat],
    join_progress: &'a dyn ProgressCallback,
}

/// Runs `definition` with `options` applied.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage; nothing after the
/// failing stage runs.
pub async fn run_analysis(
    definition: &AnalysisDefinition,
    options: &RunOptions,
    progress: &PipelineProgress,
) -> Result<AnalysisReport, PipelineError> {
    definition
        .validate()
        .map_err(|message| crate::DefinitionError::Invalid {
            id: definition.id.clone(),
            message,
        })?;

    let steps = &progress.steps;
    steps.set_total(step_count(definition));
    log::info!("Running analysis {} ({})", definition.id, definition.name);

    let output_dir = resolve(
        &options.data_dir,
        options
            .output_dir
            .as_deref()
            .unwrap_or(&definition.output_dir),
    );

    steps.set_message(format!("Loading {NEIGHBORHOODS}"));
    let neighborhoods = load_boundaries(
        NEIGHBORHOODS,
        &definition.neighborhoods.boundaries,
        &options.data_dir,
    )?;
    steps.inc(1);

    steps.set_message("Loading collisions".to_string());
    let mut incidents = definition.incidents.clone();
    if let Some(year) = &options.year {
        incidents.year = Some(year.clone());
    }
    let crs = incidents
        .crs
        .clone()
        .unwrap_or_else(|| neighborhoods.crs.clone());
    let incidents_path = resolve(&options.data_dir, &incidents.path);
    let points = build_point_layer(&incidents_path, &incidents, crs).map_err(|source| {
        PipelineError::Incident {
            stage: Stage::BuildPoints,
            source,
        }
    })?;
    steps.inc(1);

    let context = LayerContext {
        analysis_id: &definition.id,
        output_dir: &output_dir,
        density: &definition.density,
        formats: &definition.formats,
        join_progress: progress.join.as_ref(),
    };

    steps.set_message(format!("Analyzing {NEIGHBORHOODS}"));
    let (neighborhood_report, _) = analyze_layer(
        &neighborhoods,
        &points,
        definition.neighborhoods.predicate,
        &context,
    )?;
    steps.inc(1);

    let mut layers = vec![neighborhood_report];
    let mut correlations = Vec::new();
    let mut correlation_outputs = Vec::new();

    if let Some(tract_def) = &definition.tracts {
        steps.set_message(format!("Loading {TRACTS}"));
        let mut tracts = load_boundaries(TRACTS, &tract_def.boundaries, &options.data_dir)?;
        if tract_def.clip_to_neighborhoods {
            tracts = subset_intersecting(&tracts, &neighborhoods).map_err(|source| {
                PipelineError::Spatial {
                    stage: Stage::Subset,
                    layer: TRACTS.to_string(),
                    source,
                }
            })?;
        }
        steps.inc(1);

        steps.set_message(format!("Analyzing {TRACTS}"));
        let (tract_report, tract_densities) =
            analyze_layer(&tracts, &points, tract_def.predicate, &context)?;
        layers.push(tract_report);
        steps.inc(1);

        if let Some(census) = &definition.census {
            steps.set_message("Correlating external attributes".to_string());
            let observations = load_observations(census, &options.data_dir).await?;
            let (summaries, written) =
                correlate_external(&tract_densities, &observations, census, &context)?;
            correlations = summaries;
            correlation_outputs = written;
            steps.inc(1);
        }
    }

    steps.finish(format!("{}: analysis complete", definition.id));

    Ok(AnalysisReport {
        analysis: definition.id.clone(),
        cleaning: points.report,
        layers,
        correlations,
        correlation_outputs,
    })
}

fn step_count(definition: &AnalysisDefinition) -> u64 {
    let tracts = if definition.tracts.is_some() { 2 } else { 0 };
    let census = u64::from(definition.census.is_some());
    3 + tracts + census
}

fn load_boundaries(
    name: &str,
    config: &BoundaryLayerConfig,
    data_dir: &Path,
) -> Result<PolygonLayer, PipelineError> {
    load_layer(name, &resolve(data_dir, &config.path), config).map_err(|source| {
        PipelineError::Boundary {
            stage: Stage::LoadBoundaries,
            layer: name.to_string(),
            source,
        }
    })
}

/// Join, count, density, merge, and write for one polygon layer.
///
/// Returns the layer summary and the density rows (before the unmatched
/// policy drops or nulls anything).
fn analyze_layer(
    layer: &PolygonLayer,
    points: &PointLayer,
    predicate: SpatialPredicate,
    context: &LayerContext<'_>,
) -> Result<(LayerReport, Vec<DensityRow>), PipelineError> {
    let joined = join_points(points, layer, predicate, context.join_progress)
        .map_err(|source| PipelineError::Spatial {
            stage: Stage::Join,
            layer: layer.name.clone(),
            source,
        })?;

    let matched_points = joined
        .iter()
        .filter(|record| record.polygon.is_some())
        .map(|record| record.point.source_row)
        .collect::<BTreeSet<_>>()
        .len();
    let unmatched_points = joined.iter().filter(|r| r.polygon.is_none()).count();

    let mut counts = count_by_polygon(&joined);
    let polygons_with_points = counts.len();
    if context.density.unmatched == UnmatchedPolicy::Zero {
        counts = with_zero_counts(layer, &counts);
    }

    let densities = compute_densities(layer, &counts, context.density).map_err(|source| {
        PipelineError::Analytics {
            stage: Stage::Density,
            layer: layer.name.clone(),
            source,
        }
    })?;

    let features: Vec<PolygonFeature> = merge_layer(layer, &densities)
        .iter()
        .filter(|merged| {
            context.density.unmatched != UnmatchedPolicy::Drop || merged.metrics.is_some()
        })
        .map(|merged| merged.to_feature())
        .collect();

    let outputs = write_layer(layer, &features, context)?;

    log::info!(
        "{}: {matched_points} points matched {polygons_with_points} of {} polygons, {unmatched_points} unmatched",
        layer.name,
        layer.len()
    );

    Ok((
        LayerReport {
            layer: layer.name.clone(),
            features: layer.len(),
            matched_points,
            unmatched_points,
            polygons_with_points,
            outputs,
        },
        densities,
    ))
}

fn write_layer(
    layer: &PolygonLayer,
    features: &[PolygonFeature],
    context: &LayerContext<'_>,
) -> Result<Vec<PathBuf>, PipelineError> {
    let write_error = |source| PipelineError::Boundary {
        stage: Stage::Write,
        layer: layer.name.clone(),
        source,
    };

    context
        .formats
        .iter()
        .map(|format| {
            let path = output_path(
                context.output_dir,
                context.analysis_id,
                &layer.name,
                format.extension(),
            );
            let written = match format {
                OutputFormat::Geojson => write_geojson(&path, &layer.crs, features),
                OutputFormat::Csv => write_csv(&path, features),
            };
            written.map_err(write_error)?;
            log::info!("{}: wrote {}", layer.name, path.display());
            Ok(path)
        })
        .collect()
}

async fn load_observations(
    census: &ExternalAttributesConfig,
    data_dir: &Path,
) -> Result<Vec<LongRow>, PipelineError> {
    let census_error = |source| PipelineError::Census {
        stage: Stage::ExternalAttributes,
        source,
    };

    match &census.source {
        ExternalSource::Acs(query) => {
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| census_error(CensusError::Http(e)))?;
            fetch_acs(&client, query, &census.variables)
                .await
                .map_err(census_error)
        }
        ExternalSource::LongCsv(source) => {
            load_long_csv(&resolve(data_dir, &source.path), source).map_err(census_error)
        }
    }
}

/// Reshapes observations, joins them to tract densities, correlates each
/// variable, and writes the joined table and the summaries.
fn correlate_external(
    densities: &[DensityRow],
    observations: &[LongRow],
    census: &ExternalAttributesConfig,
    context: &LayerContext<'_>,
) -> Result<(Vec<CorrelationSummary>, Vec<PathBuf>), PipelineError> {
    let wide = pivot_wider(observations, &census.variables).map_err(|source| {
        PipelineError::Analytics {
            stage: Stage::ExternalAttributes,
            layer: TRACTS.to_string(),
            source,
        }
    })?;

    let variables: Vec<String> = if census.variables.is_empty() {
        wide.iter()
            .flat_map(|row| row.values.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        census.variables.clone()
    };

    let rows = join_external(densities, &wide, &variables);
    let summaries: Vec<CorrelationSummary> = variables
        .iter()
        .filter_map(|variable| correlate(&rows, variable))
        .collect();

    for summary in &summaries {
        log::info!(
            "{}: r = {:.3}, slope = {:.6}, n = {}",
            summary.variable,
            summary.pearson_r,
            summary.slope,
            summary.n
        );
    }
    if summaries.len() < variables.len() {
        log::warn!(
            "{} of {} variables had too few observations or no variance to correlate",
            variables.len() - summaries.len(),
            variables.len()
        );
    }

    let (dir, id) = (context.output_dir, context.analysis_id);
    let table = output_path(dir, id, "tract_attributes", "csv");
    write_correlation_rows(&table, &rows, &variables)?;

    let summary_path = output_path(dir, id, "correlation", "csv");
    write_summaries(&summary_path, &summaries)?;

    Ok((summaries, vec![table, summary_path]))
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::Csv {
            stage: Stage::Write,
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    }
    csv::Writer::from_path(path).map_err(|source| PipelineError::Csv {
        stage: Stage::Write,
        path: path.to_path_buf(),
        source,
    })
}

fn write_correlation_rows(
    path: &Path,
    rows: &[CorrelationRow],
    variables: &[String],
) -> Result<(), PipelineError> {
    let csv_error = |source| PipelineError::Csv {
        stage: Stage::Write,
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv_writer(path)?;

    let mut header = vec!["id".to_string(), "density".to_string()];
    header.extend(variables.iter().cloned());
    writer.write_record(&header).map_err(csv_error)?;

    for row in rows {
        let mut record = vec![row.id.clone(), row.density.to_string()];
        record.extend(variables.iter().map(|variable| {
            row.values
                .get(variable)
                .copied()
                .flatten()
                .map_or_else(String::new, |value| value.to_string())
        }));
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| csv_error(e.into()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn write_summaries(path: &Path, summaries: &[CorrelationSummary]) -> Result<(), PipelineError> {
    let csv_error = |source| PipelineError::Csv {
        stage: Stage::Write,
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv_writer(path)?;
    for summary in summaries {
        writer.serialize(summary).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| csv_error(e.into()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use collision_map_analytics_models::AreaUnit;
    use collision_map_boundary_models::DuplicatePolicy;
    use collision_map_census_models::LongCsvSource;
    use collision_map_incident_models::{CleaningReport, DateMatching, IncidentSourceConfig};
    use collision_map_pipeline_models::{LayerDefinition, TractDefinition};
    use serde_json::json;

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("collision-map-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn rect(id_field: &str, id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        properties.insert(id_field.to_string(), id.into());
        json!({
            "type": "Feature",
            "properties": properties,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
            }
        })
    }

    fn write_layer_file(dir: &Path, name: &str, features: Vec<serde_json::Value>) {
        let body = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32618" } },
            "features": features,
        });
        std::fs::write(dir.join(name), body.to_string()).unwrap();
    }

    /// Three 100 m neighborhoods A, B, C; four tracts, the last far away;
    /// seven collision rows of which five survive cleaning.
    fn fixture() -> (PathBuf, AnalysisDefinition) {
        let dir = temp_dir();

        write_layer_file(
            &dir,
            "neighborhoods.geojson",
            vec![
                rect("name", "A", 0.0, 0.0, 100.0, 100.0),
                rect("name", "B", 200.0, 0.0, 300.0, 100.0),
                rect("name", "C", 400.0, 0.0, 500.0, 100.0),
            ],
        );
        write_layer_file(
            &dir,
            "tracts.geojson",
            vec![
                rect("GEOID", "t1", 0.0, 0.0, 15.0, 100.0),
                rect("GEOID", "t2", 15.0, 0.0, 100.0, 100.0),
                rect("GEOID", "t3", 200.0, 0.0, 300.0, 100.0),
                rect("GEOID", "t4", 1000.0, 1000.0, 1100.0, 1100.0),
            ],
        );
        std::fs::write(
            dir.join("collisions.csv"),
            "\u{feff}X,Y,CRASH_DATE\n\
             10,10,2018-01-02\n\
             20,20,2018-02-03\n\
             30,30,2018-03-04\n\
             250,50,2018-04-05\n\
             150,50,2018-05-06\n\
             40,40,2017-06-07\n\
             ,60,2018-07-08\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("vehicles.csv"),
            "GEOID,variable,estimate\n\
             t1,no_vehicle,10\n\
             t2,no_vehicle,20\n\
             t3,no_vehicle,40\n\
             t4,no_vehicle,99\n",
        )
        .unwrap();

        let boundaries = |path: &str, id_field: &str| BoundaryLayerConfig {
            path: PathBuf::from(path),
            id_field: id_field.to_string(),
            duplicates: DuplicatePolicy::Reject,
            crs: None,
        };

        let definition = AnalysisDefinition {
            id: "demo".to_string(),
            name: "Demo".to_string(),
            description: None,
            output_dir: PathBuf::from("output"),
            formats: vec![OutputFormat::Geojson, OutputFormat::Csv],
            incidents: IncidentSourceConfig {
                path: PathBuf::from("collisions.csv"),
                x_column: "X".to_string(),
                y_column: "Y".to_string(),
                date_column: "CRASH_DATE".to_string(),
                repair_first_column: Some("X".to_string()),
                year: Some("2018".to_string()),
                date_matching: DateMatching::Prefix,
                crs: None,
                delimiter: None,
            },
            neighborhoods: LayerDefinition {
                boundaries: boundaries("neighborhoods.geojson", "name"),
                predicate: SpatialPredicate::Within,
            },
            tracts: Some(TractDefinition {
                boundaries: boundaries("tracts.geojson", "GEOID"),
                predicate: SpatialPredicate::Within,
                clip_to_neighborhoods: true,
            }),
            density: DensityOptions {
                unit: AreaUnit::SquareMetres,
                ..DensityOptions::default()
            },
            census: Some(ExternalAttributesConfig {
                variables: vec!["no_vehicle".to_string()],
                source: ExternalSource::LongCsv(LongCsvSource {
                    path: PathBuf::from("vehicles.csv"),
                    id_column: "GEOID".to_string(),
                    variable_column: "variable".to_string(),
                    value_column: "estimate".to_string(),
                }),
            }),
        };

        (dir, definition)
    }

    fn options(dir: &Path) -> RunOptions {
        RunOptions {
            data_dir: dir.to_path_buf(),
            year: None,
            output_dir: None,
        }
    }

    #[tokio::test]
    async fn runs_neighborhoods_tracts_and_correlation() {
        let (dir, definition) = fixture();
        let report = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap();

        assert_eq!(
            report.cleaning,
            CleaningReport {
                total_rows: 7,
                dropped_incomplete: 1,
                dropped_invalid_coordinates: 0,
                dropped_other_year: 1,
                retained: 5,
            }
        );

        let neighborhoods = &report.layers[0];
        assert_eq!(neighborhoods.layer, NEIGHBORHOODS);
        assert_eq!(neighborhoods.features, 3);
        assert_eq!(neighborhoods.matched_points, 4);
        assert_eq!(neighborhoods.unmatched_points, 1);
        assert_eq!(neighborhoods.polygons_with_points, 2);

        let tracts = &report.layers[1];
        assert_eq!(tracts.features, 3, "far tract is clipped away");
        assert_eq!(tracts.matched_points, 4);
        assert_eq!(tracts.polygons_with_points, 3);

        assert_eq!(report.correlations.len(), 1);
        assert_eq!(report.correlations[0].variable, "no_vehicle");
        assert_eq!(report.correlations[0].n, 3);
        assert!(report.correlation_outputs.iter().all(|p| p.is_file()));
    }

    #[tokio::test]
    async fn written_layer_keeps_every_polygon_and_its_crs() {
        let (dir, definition) = fixture();
        let report = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap();

        let geojson = report.layers[0]
            .outputs
            .iter()
            .find(|p| p.extension().is_some_and(|e| e == "geojson"))
            .unwrap();
        let config = BoundaryLayerConfig {
            path: geojson.clone(),
            id_field: "name".to_string(),
            duplicates: DuplicatePolicy::Reject,
            crs: None,
        };
        let written = load_layer("written", geojson, &config).unwrap();

        assert_eq!(written.crs.code(), "32618");
        let by_id = written.by_id();
        assert_eq!(by_id["A"].attributes["count"], 3);
        assert!((by_id["A"].attributes["area"].as_f64().unwrap() - 10_000.0).abs() < 1e-6);
        assert!(
            (by_id["A"].attributes["density"].as_f64().unwrap() - 0.0003).abs() < 1e-12
        );
        assert_eq!(by_id["B"].attributes["count"], 1);
        assert!(by_id["C"].attributes["count"].is_null());
        assert!(by_id["C"].attributes["density"].is_null());
    }

    #[tokio::test]
    async fn drop_and_zero_policies_change_unmatched_polygons() {
        let (dir, mut definition) = fixture();
        definition.tracts = None;
        definition.census = None;

        definition.density.unmatched = UnmatchedPolicy::Drop;
        let report = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap();
        let path = &report.layers[0].outputs[0];
        let config = BoundaryLayerConfig {
            path: path.clone(),
            id_field: "name".to_string(),
            duplicates: DuplicatePolicy::Reject,
            crs: None,
        };
        let written = load_layer("written", path, &config).unwrap();
        assert_eq!(written.len(), 2);

        definition.density.unmatched = UnmatchedPolicy::Zero;
        run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap();
        let written = load_layer("written", path, &config).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written.by_id()["C"].attributes["count"], 0);
        assert_eq!(written.by_id()["C"].attributes["density"], 0.0);
    }

    #[tokio::test]
    async fn year_override_replaces_the_definition_year() {
        let (dir, definition) = fixture();
        let mut opts = options(&dir);
        opts.year = Some("2017".to_string());
        let report = run_analysis(&definition, &opts, &PipelineProgress::silent())
            .await
            .unwrap();
        assert_eq!(report.cleaning.retained, 1);
        assert_eq!(report.layers[0].matched_points, 1);
    }

    #[tokio::test]
    async fn crs_mismatch_names_the_join_stage() {
        let (dir, mut definition) = fixture();
        definition.incidents.crs = Some(collision_map_boundary_models::Crs::wgs84());
        let err = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Spatial { stage: Stage::Join, ref layer, .. } if layer == NEIGHBORHOODS
        ));
    }

    #[tokio::test]
    async fn missing_boundary_file_names_the_load_stage() {
        let (dir, mut definition) = fixture();
        definition.neighborhoods.boundaries.path = PathBuf::from("missing.geojson");
        let err = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Boundary { stage: Stage::LoadBoundaries, .. }
        ));
        assert!(err.to_string().starts_with("load_boundaries failed for neighborhoods"));
    }

    #[tokio::test]
    async fn census_without_tracts_is_rejected_up_front() {
        let (dir, mut definition) = fixture();
        definition.tracts = None;
        let err = run_analysis(&definition, &options(&dir), &PipelineProgress::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Definition(_)));
    }
}

//! Runs one analysis with terminal progress bars and prints its summary.

use std::time::Instant;

use collision_map_cli_utils::{BarKind, IndicatifProgress, MultiProgress};
use collision_map_pipeline::{
    AnalysisDefinition, AnalysisReport, PipelineProgress, ProgressCallback as _, RunOptions,
    run_analysis,
};

/// Runs `definition` and prints a per-layer summary.
///
/// # Errors
///
/// Returns the pipeline error of the failing stage.
pub async fn execute(
    multi: &MultiProgress,
    definition: &AnalysisDefinition,
    options: &RunOptions,
) -> Result<AnalysisReport, Box<dyn std::error::Error>> {
    let start = Instant::now();

    let progress = PipelineProgress {
        steps: IndicatifProgress::add(multi, BarKind::Stages, &definition.name),
        join: IndicatifProgress::add(multi, BarKind::Points, "Waiting for points..."),
    };

    let report = run_analysis(definition, options, &progress).await;
    progress.join.finish_and_clear();
    let report = report?;

    print_summary(&report);
    println!();
    println!("Finished in {:.1}s", start.elapsed().as_secs_f64());

    Ok(report)
}

fn print_summary(report: &AnalysisReport) {
    let cleaning = &report.cleaning;
    println!();
    println!(
        "{}: {} of {} rows retained ({} incomplete, {} bad coordinates, {} other years)",
        report.analysis,
        cleaning.retained,
        cleaning.total_rows,
        cleaning.dropped_incomplete,
        cleaning.dropped_invalid_coordinates,
        cleaning.dropped_other_year,
    );

    println!();
    println!(
        "{:<16} {:>9} {:>9} {:>9} {:>11}",
        "LAYER", "POLYGONS", "WITH PTS", "MATCHED", "UNMATCHED"
    );
    println!("{}", "-".repeat(58));
    for layer in &report.layers {
        println!(
            "{:<16} {:>9} {:>9} {:>9} {:>11}",
            layer.layer,
            layer.features,
            layer.polygons_with_points,
            layer.matched_points,
            layer.unmatched_points
        );
    }

    if !report.correlations.is_empty() {
        println!();
        println!("{:<16} {:>5} {:>8} {:>14}", "VARIABLE", "N", "R", "SLOPE");
        println!("{}", "-".repeat(46));
        for summary in &report.correlations {
            println!(
                "{:<16} {:>5} {:>8.3} {:>14.6e}",
                summary.variable, summary.n, summary.pearson_r, summary.slope
            );
        }
    }

    let outputs = report
        .layers
        .iter()
        .flat_map(|layer| layer.outputs.iter())
        .chain(report.correlation_outputs.iter());
    println!();
    for path in outputs {
        println!("  wrote {}", path.display());
    }
}

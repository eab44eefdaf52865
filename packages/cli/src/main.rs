#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the collision density toolchain.
//!
//! Runs built-in or ad-hoc analysis definitions. With no subcommand, lets
//! the user pick a built-in definition interactively.
//!
//! Uses `indicatif-log-bridge` (via [`collision_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use collision_map_pipeline::{RunOptions, all_definitions, find_definition, load_definition_file};

#[derive(Parser)]
#[command(name = "collision_map", about = "Collision density analysis")]
struct Cli {
    /// Show debug logs (`RUST_LOG` takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis definition
    Run {
        /// Built-in definition id (see `definitions`)
        id: Option<String>,
        /// Path to a definition TOML file instead of a built-in id
        #[arg(long, conflicts_with = "id")]
        config: Option<PathBuf>,
        /// Override the target year (four digits)
        #[arg(long)]
        year: Option<String>,
        /// Base directory for relative paths (default: `data/` at the project root)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the built-in analysis definitions
    Definitions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let multi = collision_map_cli_utils::init_logger(level);

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Definitions => {
            let definitions = all_definitions();
            println!("{:<24} NAME", "ID");
            println!("{}", "-".repeat(60));
            for def in &definitions {
                println!("{:<24} {}", def.id, def.name);
            }
        }
        Commands::Run {
            id,
            config,
            year,
            data_dir,
            output_dir,
            report,
        } => {
            let definition = match (id, config) {
                (_, Some(path)) => load_definition_file(&path)?,
                (Some(id), None) => find_definition(&id)
                    .ok_or_else(|| format!("Unknown analysis definition: {id}"))?,
                (None, None) => {
                    return Err("Specify a definition id or --config PATH".into());
                }
            };

            let mut options = RunOptions {
                year,
                output_dir,
                ..RunOptions::default()
            };
            if let Some(dir) = data_dir {
                options.data_dir = dir;
            }

            let summary = run::execute(&multi, &definition, &options).await?;
            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
                log::info!("Wrote report to {}", path.display());
            }
        }
    }

    Ok(())
}

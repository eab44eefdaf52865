//! Interactive definition picker.

use collision_map_cli_utils::MultiProgress;
use collision_map_pipeline::{RunOptions, all_definitions};
use dialoguer::{Confirm, Input, Select};

/// Prompts for a built-in definition and an optional year override, then
/// runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the analysis fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Collision Map");
    println!();

    let definitions = all_definitions();
    let labels: Vec<String> = definitions
        .iter()
        .map(|def| format!("{} ({})", def.name, def.id))
        .collect();

    let idx = Select::new()
        .with_prompt("Which analysis would you like to run?")
        .items(&labels)
        .default(0)
        .interact()?;
    let mut definition = definitions[idx].clone();

    let change_year = Confirm::new()
        .with_prompt(format!(
            "Target year is {}. Change it?",
            definition.incidents.year.as_deref().unwrap_or("unset")
        ))
        .default(false)
        .interact()?;
    if change_year {
        let year: String = Input::new()
            .with_prompt("Target year (empty for all years)")
            .allow_empty(true)
            .interact_text()?;
        let year = year.trim();
        definition.incidents.year = (!year.is_empty()).then(|| year.to_string());
    }

    crate::run::execute(multi, &definition, &RunOptions::default()).await?;

    Ok(())
}

//! Compile-time registry of built-in analysis definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding an analysis requires creating a TOML file in `definitions/` and
//! adding a corresponding entry here.

use std::path::Path;

use collision_map_pipeline_models::AnalysisDefinition;

use crate::DefinitionError;

/// Number of registered definitions. Enforced by a test.
#[cfg(test)]
const EXPECTED_DEFINITION_COUNT: usize = 2;

/// Embedded TOML definitions.
const DEFINITION_TOMLS: &[(&str, &str)] = &[
    (
        "nyc_collisions_2018",
        include_str!("../definitions/nyc_collisions_2018.toml"),
    ),
    (
        "nyc_collisions_2017",
        include_str!("../definitions/nyc_collisions_2017.toml"),
    ),
];

/// Returns all built-in analysis definitions.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught during CI.
#[must_use]
pub fn all_definitions() -> Vec<AnalysisDefinition> {
    DEFINITION_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_definition(name, toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse analysis definition '{name}': {e}"))
        })
        .collect()
}

/// Looks up a built-in definition by id.
#[must_use]
pub fn find_definition(id: &str) -> Option<AnalysisDefinition> {
    all_definitions().into_iter().find(|def| def.id == id)
}

/// Parses and validates a definition. `name` is only used in errors.
///
/// # Errors
///
/// * [`DefinitionError::Parse`] if the TOML does not match the schema
/// * [`DefinitionError::Invalid`] if a cross-field constraint fails
pub fn parse_definition(name: &str, body: &str) -> Result<AnalysisDefinition, DefinitionError> {
    let definition: AnalysisDefinition =
        toml::from_str(body).map_err(|source| DefinitionError::Parse {
            name: name.to_string(),
            source,
        })?;

    definition
        .validate()
        .map_err(|message| DefinitionError::Invalid {
            id: definition.id.clone(),
            message,
        })?;

    Ok(definition)
}

/// Reads a definition from a TOML file on disk.
///
/// # Errors
///
/// * [`DefinitionError::Io`] if the file cannot be read
/// * otherwise as [`parse_definition`]
pub fn load_definition_file(path: &Path) -> Result<AnalysisDefinition, DefinitionError> {
    let body = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_definition(&path.display().to_string(), &body)
}

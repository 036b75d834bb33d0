//! Mapping file selection
//!
//! Command-line flags win over the user config; the mappings directory
//! falls back to `./mappings`.

use anyhow::{bail, Context, Result};
use mes::CodeTable;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::MappingArgs;
use crate::config::Config;
use crate::file_utils;

const DEFAULT_MAPPINGS_DIR: &str = "mappings";

/// A resolved mapping file and font variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSelection {
    pub path: PathBuf,
    pub font: Option<String>,
}

/// File name of the mapping for a game and region
pub fn mapping_file_name(game: &str, region: &str) -> String {
    format!("{}_{}.json", game.to_lowercase(), region.to_lowercase())
}

/// Resolve the mapping file from flags and config
pub fn resolve(args: &MappingArgs, config: &Config) -> Result<MappingSelection> {
    let font = args.font.clone().or_else(|| config.font.clone());

    if let Some(path) = &args.mapping_file {
        return Ok(MappingSelection {
            path: path.clone(),
            font,
        });
    }

    let dir = args
        .mappings
        .clone()
        .or_else(|| config.mappings_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPINGS_DIR));

    let Some(game) = args.game.as_deref().or(config.game.as_deref()) else {
        bail!("No game selected. Pass --game or set a default with `mes configure --game`");
    };
    let Some(region) = args.region.as_deref().or(config.region.as_deref()) else {
        bail!("No region selected. Pass --region or set a default with `mes configure --region`");
    };

    let path = dir.join(mapping_file_name(game, region));
    if !path.is_file() {
        bail!(
            "No mapping exists for game '{}' in region '{}' (looked for {}){}",
            game.to_lowercase(),
            region.to_lowercase(),
            path.display(),
            available_hint(&dir)
        );
    }

    Ok(MappingSelection { path, font })
}

fn available_hint(dir: &Path) -> String {
    let names: Vec<String> = file_utils::collect_files_with_extension(dir, &["json"])
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();

    if names.is_empty() {
        String::new()
    } else {
        format!("\nAvailable mappings: {}", names.join(", "))
    }
}

/// Build the code table for a selection
pub fn load(selection: &MappingSelection) -> Result<CodeTable> {
    debug!(
        path = %selection.path.display(),
        font = selection.font.as_deref().unwrap_or("original"),
        "loading mapping"
    );
    CodeTable::load(&selection.path, selection.font.as_deref())
        .with_context(|| format!("Failed to load mapping {}", selection.path.display()))
}

/// Resolve against the user config and build the code table
pub fn load_table(args: &MappingArgs) -> Result<CodeTable> {
    let config = Config::load()?;
    load(&resolve(args, &config)?)
}

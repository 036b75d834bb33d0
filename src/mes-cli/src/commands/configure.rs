//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up mes CLI defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Values passed to `mes configure`
#[derive(Debug, Default)]
pub struct Settings {
    pub mappings: Option<PathBuf>,
    pub game: Option<String>,
    pub region: Option<String>,
    pub font: Option<String>,
}

impl Settings {
    fn is_empty(&self) -> bool {
        self.mappings.is_none() && self.game.is_none() && self.region.is_none() && self.font.is_none()
    }
}

/// Handle the configure command
pub fn handle(settings: Settings, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if settings.is_empty() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, settings);
    config.save()?;

    show_config(&config);
    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }

    Ok(())
}

/// Merge new settings into the configuration; game and region are stored lowercase
fn apply(config: &mut Config, settings: Settings) {
    if let Some(dir) = settings.mappings {
        config.mappings_dir = Some(dir);
    }
    if let Some(game) = settings.game {
        config.game = Some(game.to_lowercase());
    }
    if let Some(region) = settings.region {
        config.region = Some(region.to_lowercase());
    }
    if let Some(font) = settings.font {
        config.font = Some(font);
    }
}

/// Display current configuration
fn show_config(config: &Config) {
    let unset = "(not set)";
    println!(
        "Mappings directory: {}",
        config
            .mappings_dir
            .as_ref()
            .map_or_else(|| unset.to_string(), |p| p.display().to_string())
    );
    println!("Game: {}", config.game.as_deref().unwrap_or(unset));
    println!("Region: {}", config.region.as_deref().unwrap_or(unset));
    println!("Font: {}", config.font.as_deref().unwrap_or("original"));

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: mes configure [--mappings DIR] [--game GAME] [--region REGION] [--font FONT]");
    println!("   or: mes configure --show");
    println!();
    println!("Mapping files are looked up as <mappings>/<game>_<region>.json.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }

    #[test]
    fn test_apply_merges_settings() {
        let mut config = Config {
            mappings_dir: Some(PathBuf::from("mappings")),
            game: Some("aa1".to_string()),
            region: None,
            font: None,
        };

        apply(
            &mut config,
            Settings {
                region: Some("EU".to_string()),
                font: Some("edited".to_string()),
                ..Settings::default()
            },
        );

        assert_eq!(config.mappings_dir, Some(PathBuf::from("mappings")));
        assert_eq!(config.game.as_deref(), Some("aa1"));
        assert_eq!(config.region.as_deref(), Some("eu"));
        assert_eq!(config.font.as_deref(), Some("edited"));
    }

    #[test]
    fn test_empty_settings() {
        assert!(Settings::default().is_empty());
        assert!(!Settings {
            game: Some("aa2".to_string()),
            ..Settings::default()
        }
        .is_empty());
    }
}

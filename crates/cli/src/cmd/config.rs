//! Configuration management command
//!
//! View and edit `docintake.toml` by dotted key.

use anyhow::{Context, Result};
use docintake_cli::config::{self, example_config, Config, KEYS};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn load(config_path: &Path) -> Result<Config> {
    Config::load(config_path).with_context(|| format!("Failed to load {}", config_path.display()))
}

/// List all configuration values
pub fn run_list(config_path: Option<PathBuf>) -> Result<()> {
    let path = config::config_path(config_path.as_deref());
    let config = load(&path)?;

    println!("{}", "Configuration".bold());
    let location = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not created, showing defaults)", path.display())
    };
    println!("{}: {}", "Location".dimmed(), location.dimmed());

    let mut section = "";
    for &key in KEYS {
        let (head, field) = key.split_once('.').unwrap_or(("", key));
        if head != section {
            println!("\n{}", format!("[{head}]").yellow());
            section = head;
        }
        let value = config.get(key)?;
        if value.is_empty() {
            println!("  {} = {}", field.cyan(), "(unset)".dimmed());
        } else {
            println!("  {} = {}", field.cyan(), value);
        }
    }

    if !config.watches.is_empty() {
        println!("\n{}", "[[watch]]".yellow());
        for watch in &config.watches {
            let out = watch
                .out_dir
                .as_ref()
                .map(|d| format!(" -> {}", d.display()))
                .unwrap_or_default();
            println!(
                "  {} {} {}{}",
                watch.folder.display(),
                "|".dimmed(),
                watch.recipe.cyan(),
                out.dimmed()
            );
        }
    }

    Ok(())
}

/// Get a single configuration value
pub fn run_get(config_path: Option<PathBuf>, key: &str) -> Result<()> {
    let config = load(&config::config_path(config_path.as_deref()))?;
    let value = config
        .get(key)
        .context("Use 'docintake config list' to see available keys")?;
    println!("{value}");
    Ok(())
}

/// Set a configuration value
pub fn run_set(config_path: Option<PathBuf>, key: &str, value: &str) -> Result<()> {
    let path = config::config_path(config_path.as_deref());
    let mut config = load(&path)?;

    config
        .set(key, value)
        .context("Use 'docintake config list' to see available keys")?;
    config.save(&path).context("Invalid configuration value")?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    if key != "settings.out_dir" {
        println!(
            "{}",
            "Note: restart a running daemon for this change to take effect".yellow()
        );
    }
    Ok(())
}

/// Print the config file path in use
pub fn run_path(config_path: Option<PathBuf>) -> Result<()> {
    let path = config::config_path(config_path.as_deref());
    println!("{}", path.display());
    if !path.exists() {
        println!("{}", "File does not exist; defaults apply.".yellow());
    }
    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    print!("{}", example_config());
    Ok(())
}

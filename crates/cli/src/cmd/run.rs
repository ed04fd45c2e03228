//! Run the intake daemon in the foreground

use anyhow::{Context, Result};
use docintake_cli::config::{self, Config, WatchConfig};
use docintake_cli::{logging, run_until_ctrl_c, Daemon};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Ad-hoc watch given on the command line
pub struct AdHocWatch {
    pub folder: PathBuf,
    pub recipe: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub scan_existing: bool,
}

pub async fn run(config_path: Option<PathBuf>, ad_hoc: Option<AdHocWatch>) -> Result<()> {
    let config_path = config::config_path(config_path.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let _log_guard = logging::init("info", config.logging.dir.as_deref());

    if let Some(watch) = ad_hoc {
        config.watches.push(WatchConfig {
            folder: watch.folder,
            recipe: watch
                .recipe
                .unwrap_or_else(|| config.settings.default_recipe_id.clone()),
            out_dir: watch.out_dir,
            scan_existing: watch.scan_existing,
        });
    }

    if config.watches.is_empty() {
        anyhow::bail!(
            "Nothing to watch: add a [[watch]] section to {} or pass --watch",
            config_path.display()
        );
    }

    let daemon = Daemon::from_config(&config_path, &config)?;

    println!("{}", "docintake running".bold());
    println!("{}: {}", "Config".dimmed(), config_path.display().dimmed());
    for info in daemon.registry().watches() {
        println!(
            "  {} {} {} {}",
            "✓".green(),
            info.folder.display(),
            "->".dimmed(),
            info.recipe_ref.cyan()
        );
    }
    println!("{}", "Press Ctrl-C to stop".dimmed());

    let handled = run_until_ctrl_c(daemon).await?;
    println!("{} stopped after {} job(s)", "✓".green(), handled);
    Ok(())
}


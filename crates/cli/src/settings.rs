//! Late-bound default output directory
//!
//! Reads `settings.out_dir` from the config file on every job so an edit
//! (e.g. `docintake config set settings.out_dir ...`) applies without a
//! restart.

use crate::config::Config;
use anyhow::Result;
use docintake_worker::OutDirSource;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::warn;

pub struct SettingsOutDir {
    config_path: PathBuf,
    last_good: Mutex<PathBuf>,
}

impl SettingsOutDir {
    /// `initial` is returned until the file has been read successfully
    pub fn new(config_path: impl Into<PathBuf>, initial: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            last_good: Mutex::new(initial.into()),
        }
    }
}

impl OutDirSource for SettingsOutDir {
    fn resolve_out_dir(&self) -> Result<PathBuf> {
        match Config::load(&self.config_path) {
            Ok(config) => {
                let mut last_good = self.last_good.lock();
                *last_good = config.settings.out_dir;
                Ok(last_good.clone())
            }
            Err(e) => {
                let fallback = self.last_good.lock().clone();
                warn!(
                    config = %self.config_path.display(),
                    error = %e,
                    fallback = %fallback.display(),
                    "could not re-read settings, using last known output directory"
                );
                Ok(fallback)
            }
        }
    }
}

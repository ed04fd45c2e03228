//! Configuration file (`docintake.toml`)
//!
//! Located by `--config`, else `$DOCINTAKE_CONFIG`, else `./docintake.toml`.
//! A missing file means defaults. Values are validated on load and before
//! every save.

use docintake_core::{DedupSet, StabilityProbe};
use docintake_watcher::FilterConfig;
use docintake_worker::WorkerOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "DOCINTAKE_CONFIG";

/// Config file used when neither `--config` nor the environment names one
pub const DEFAULT_CONFIG_FILE: &str = "docintake.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: SettingsConfig,
    pub worker: WorkerConfig,
    pub stability: StabilityConfig,
    pub filter: FilterConfig,
    pub dedup: DedupConfig,
    pub recipes: RecipesConfig,
    pub processor: ProcessorConfig,
    pub logging: LoggingConfig,
    /// Watches started with the daemon
    #[serde(rename = "watch", skip_serializing_if = "Vec::is_empty")]
    pub watches: Vec<WatchConfig>,
}

/// User-facing defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub default_watch_folder: PathBuf,
    pub default_recipe_id: String,
    /// Output directory for jobs whose watch has no override
    pub out_dir: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            default_watch_folder: PathBuf::from("inbox"),
            default_recipe_id: "default".to_string(),
            out_dir: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads draining the queue (default: 1)
    pub threads: usize,
    /// Move originals into `Processed/` on success (default: true)
    pub move_original: bool,
    /// Queue poll timeout in milliseconds (default: 500)
    pub poll_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            move_original: true,
            poll_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Delay between size polls in milliseconds (default: 1500)
    pub interval_ms: u64,
    /// Consecutive unchanged readings required (default: 2)
    pub required_checks: u32,
    /// Give up on a file after this many polls (default: never)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1500,
            required_checks: 2,
            max_polls: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum remembered fingerprints; 0 = unbounded
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipesConfig {
    /// Directory searched for `<id>.json`
    pub dir: PathBuf,
    /// Extra directories allowed for path-style recipe references
    pub allowed_bases: Vec<PathBuf>,
}

impl Default for RecipesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("recipes"),
            allowed_bases: Vec::new(),
        }
    }
}

/// External command used to process each document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Program to run; no processing is possible while empty
    pub command: String,
    /// Arguments; `{path}` and `{recipe}` are substituted per job
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write daily-rolling log files here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub folder: PathBuf,
    pub recipe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub scan_existing: bool,
}

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "settings.default_watch_folder",
    "settings.default_recipe_id",
    "settings.out_dir",
    "worker.threads",
    "worker.move_original",
    "worker.poll_timeout_ms",
    "stability.interval_ms",
    "stability.required_checks",
    "stability.max_polls",
    "filter.extensions",
    "filter.ignore_patterns",
    "dedup.capacity",
    "recipes.dir",
    "recipes.allowed_bases",
    "processor.command",
    "processor.args",
    "logging.dir",
];

/// Resolve which config file to use
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

impl Config {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate and write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let text = toml::to_string_pretty(self)?;

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker.threads == 0 {
            return Err(ConfigError::Invalid("worker.threads must be at least 1".into()));
        }
        if self.stability.required_checks == 0 {
            return Err(ConfigError::Invalid(
                "stability.required_checks must be at least 1".into(),
            ));
        }
        if self.stability.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "stability.interval_ms must be greater than 0".into(),
            ));
        }
        if self.stability.max_polls == Some(0) {
            return Err(ConfigError::Invalid(
                "stability.max_polls must be at least 1 when set".into(),
            ));
        }
        for watch in &self.watches {
            if watch.recipe.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "watch on {} has an empty recipe",
                    watch.folder.display()
                )));
            }
        }
        Ok(())
    }

    /// Read a value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "settings.default_watch_folder" => self.settings.default_watch_folder.display().to_string(),
            "settings.default_recipe_id" => self.settings.default_recipe_id.clone(),
            "settings.out_dir" => self.settings.out_dir.display().to_string(),
            "worker.threads" => self.worker.threads.to_string(),
            "worker.move_original" => self.worker.move_original.to_string(),
            "worker.poll_timeout_ms" => self.worker.poll_timeout_ms.to_string(),
            "stability.interval_ms" => self.stability.interval_ms.to_string(),
            "stability.required_checks" => self.stability.required_checks.to_string(),
            "stability.max_polls" => self
                .stability
                .max_polls
                .map_or_else(String::new, |n| n.to_string()),
            "filter.extensions" => self.filter.extensions.join(","),
            "filter.ignore_patterns" => self.filter.ignore_patterns.join(","),
            "dedup.capacity" => self.dedup.capacity.to_string(),
            "recipes.dir" => self.recipes.dir.display().to_string(),
            "recipes.allowed_bases" => join_paths(&self.recipes.allowed_bases),
            "processor.command" => self.processor.command.clone(),
            "processor.args" => self.processor.args.join(" "),
            "logging.dir" => self
                .logging
                .dir
                .as_ref()
                .map_or_else(String::new, |d| d.display().to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Assign a value by dotted key
    ///
    /// List values are comma-separated; `processor.args` is whitespace
    /// separated. An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "settings.default_watch_folder" => self.settings.default_watch_folder = value.into(),
            "settings.default_recipe_id" => self.settings.default_recipe_id = value.to_string(),
            "settings.out_dir" => self.settings.out_dir = value.into(),
            "worker.threads" => self.worker.threads = parse(key, value, "a positive integer")?,
            "worker.move_original" => {
                self.worker.move_original = parse(key, value, "'true' or 'false'")?
            }
            "worker.poll_timeout_ms" => {
                self.worker.poll_timeout_ms = parse(key, value, "milliseconds")?
            }
            "stability.interval_ms" => {
                self.stability.interval_ms = parse(key, value, "milliseconds")?
            }
            "stability.required_checks" => {
                self.stability.required_checks = parse(key, value, "a positive integer")?
            }
            "stability.max_polls" => {
                self.stability.max_polls = if value.trim().is_empty() {
                    None
                } else {
                    Some(parse(key, value, "a positive integer or empty")?)
                }
            }
            "filter.extensions" => self.filter.extensions = split_list(value),
            "filter.ignore_patterns" => self.filter.ignore_patterns = split_list(value),
            "dedup.capacity" => {
                self.dedup.capacity = parse(key, value, "a non-negative integer")?
            }
            "recipes.dir" => self.recipes.dir = value.into(),
            "recipes.allowed_bases" => {
                self.recipes.allowed_bases = split_list(value).into_iter().map(PathBuf::from).collect()
            }
            "processor.command" => self.processor.command = value.to_string(),
            "processor.args" => {
                self.processor.args = value.split_whitespace().map(str::to_string).collect()
            }
            "logging.dir" => {
                self.logging.dir = (!value.trim().is_empty()).then(|| PathBuf::from(value))
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn probe(&self) -> StabilityProbe {
        let probe = StabilityProbe::new(
            Duration::from_millis(self.stability.interval_ms),
            self.stability.required_checks,
        );
        match self.stability.max_polls {
            Some(max) => probe.with_max_polls(max),
            None => probe,
        }
    }

    pub fn dedup_set(&self) -> DedupSet {
        DedupSet::with_capacity(self.dedup.capacity)
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            move_original: self.worker.move_original,
            poll_timeout: Duration::from_millis(self.worker.poll_timeout_ms),
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Commented example printed by `docintake config example`
pub fn example_config() -> &'static str {
    r#"# docintake configuration

[settings]
default_watch_folder = "inbox"
default_recipe_id = "default"
out_dir = "out"

[worker]
threads = 1
move_original = true
poll_timeout_ms = 500

[stability]
interval_ms = 1500
required_checks = 2
# max_polls = 40

[filter]
extensions = ["pdf", "png", "jpg", "jpeg", "tif", "tiff"]
ignore_patterns = []

[dedup]
capacity = 0  # 0 = unbounded

[recipes]
dir = "recipes"
allowed_bases = []

[processor]
command = "ocr-engine"
args = ["--recipe", "{recipe}", "{path}"]

# [logging]
# dir = "logs"

# [[watch]]
# folder = "inbox"
# recipe = "default"
# out_dir = "out/invoices"
# scan_existing = true
"#
}

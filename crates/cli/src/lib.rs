//! Docintake host: configuration, recipe resolution, the command-backed
//! processor and daemon wiring used by the `docintake` binary

pub mod command;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod recipes;
pub mod settings;

pub use command::CommandProcessor;
pub use config::{config_path, Config, ConfigError, WatchConfig};
pub use daemon::{run_until_ctrl_c, Daemon};
pub use recipes::{RecipeError, RecipeResolver};
pub use settings::SettingsOutDir;

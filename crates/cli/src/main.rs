//! Docintake CLI - docintake command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Docintake - watch folders and feed new documents to a processor
#[derive(Parser)]
#[command(name = "docintake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: $DOCINTAKE_CONFIG, then ./docintake.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured folders until Ctrl-C
    Run {
        /// Additional folder to watch
        #[arg(long)]
        watch: Option<PathBuf>,
        /// Recipe for --watch (default: settings.default_recipe_id)
        #[arg(long, requires = "watch")]
        recipe: Option<String>,
        /// Output directory for --watch (default: settings.out_dir)
        #[arg(long, requires = "watch")]
        out_dir: Option<PathBuf>,
        /// Ingest files already present in --watch
        #[arg(long, requires = "watch")]
        scan_existing: bool,
    },
    /// View or edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Print the content fingerprint of files
    Fingerprint {
        /// Files to fingerprint
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all values
    List,
    /// Print one value
    Get {
        /// Dotted key, e.g. worker.threads
        key: String,
    },
    /// Change one value
    Set {
        /// Dotted key, e.g. worker.threads
        key: String,
        value: String,
    },
    /// Print the config file path in use
    Path,
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            watch,
            recipe,
            out_dir,
            scan_existing,
        } => {
            let ad_hoc = watch.map(|folder| cmd::run::AdHocWatch {
                folder,
                recipe,
                out_dir,
                scan_existing,
            });
            cmd::run::run(cli.config, ad_hoc).await
        }
        Commands::Config(config_cmd) => {
            docintake_cli::logging::init("warn", None);
            match config_cmd {
                ConfigCommands::List => cmd::config::run_list(cli.config),
                ConfigCommands::Get { key } => cmd::config::run_get(cli.config, &key),
                ConfigCommands::Set { key, value } => cmd::config::run_set(cli.config, &key, &value),
                ConfigCommands::Path => cmd::config::run_path(cli.config),
                ConfigCommands::Example => cmd::config::run_example(),
            }
        }
        Commands::Fingerprint { files } => {
            docintake_cli::logging::init("warn", None);
            cmd::fingerprint::run(&files)
        }
    }
}

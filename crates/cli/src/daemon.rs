//! Daemon lifecycle: wire the pipeline from config, run, shut down

use crate::command::CommandProcessor;
use crate::config::{Config, WatchConfig};
use crate::recipes::RecipeResolver;
use crate::settings::SettingsOutDir;
use anyhow::{Context, Result};
use docintake_core::{ShutdownSignal, WorkQueue};
use docintake_watcher::{
    EventSource, FileFilter, Intake, NotifySource, Started, WatchOptions, WatchRegistry,
};
use docintake_worker::{IngestionWorker, OutDirSource, Processor, WorkerPool};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A running pipeline: watch registry feeding a worker pool
pub struct Daemon {
    registry: WatchRegistry,
    pool: WorkerPool,
    queue: WorkQueue,
}

impl Daemon {
    /// Build the pipeline around caller-supplied capabilities
    ///
    /// Starts the worker pool but no watches.
    pub fn start(
        config: &Config,
        source: Arc<dyn EventSource>,
        processor: Arc<dyn Processor>,
        out_dir: Arc<dyn OutDirSource>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let filter = FileFilter::new(&config.filter).context("Invalid [filter] section")?;
        let queue = WorkQueue::new();
        let intake = Intake::new(queue.clone(), Arc::new(config.dedup_set()))
            .with_filter(filter)
            .with_probe(config.probe());
        let registry = WatchRegistry::new(source, intake);

        let worker = IngestionWorker::new(queue.clone(), processor, out_dir, config.worker_options());
        let pool = WorkerPool::spawn(worker, config.worker.threads, ShutdownSignal::new())
            .context("Failed to spawn worker threads")?;

        info!(
            workers = pool.size(),
            extensions = registry.intake().filter.extension_count(),
            "pipeline started"
        );

        Ok(Self {
            registry,
            pool,
            queue,
        })
    }

    /// Build the production pipeline: OS file events, the configured command
    /// processor and the settings-backed output directory
    pub fn from_config(config_path: &Path, config: &Config) -> Result<Self> {
        let recipes = RecipeResolver::new(&config.recipes.dir, &config.recipes.allowed_bases)
            .context("Failed to set up recipe resolution")?;
        let processor = CommandProcessor::new(&config.processor, recipes)?;
        let out_dir = SettingsOutDir::new(config_path, config.settings.out_dir.clone());

        let daemon = Self::start(
            config,
            Arc::new(NotifySource::new()),
            Arc::new(processor),
            Arc::new(out_dir),
        )?;
        for watch in &config.watches {
            if let Err(e) = daemon.start_watch(watch) {
                daemon.shutdown();
                return Err(e);
            }
        }
        Ok(daemon)
    }

    pub fn start_watch(&self, watch: &WatchConfig) -> Result<Started> {
        self.registry
            .start_with(
                &watch.folder,
                &watch.recipe,
                WatchOptions {
                    out_dir: watch.out_dir.clone(),
                    scan_existing: watch.scan_existing,
                },
            )
            .with_context(|| format!("Failed to watch {}", watch.folder.display()))
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Stop every watch, then the workers; returns jobs handled
    ///
    /// Jobs still queued at this point are dropped.
    pub fn shutdown(self) -> usize {
        let watches = self.registry.stop_all();
        let pending = self.queue.len();
        let handled = self.pool.shutdown();
        info!(watches, handled, pending, "pipeline stopped");
        handled
    }
}

/// Block until Ctrl-C, then shut the daemon down
pub async fn run_until_ctrl_c(daemon: Daemon) -> Result<usize> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    tokio::task::spawn_blocking(move || daemon.shutdown())
        .await
        .context("Shutdown task failed")
}

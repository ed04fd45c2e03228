//! Background consumers that drain the work queue
//!
//! Per job: call the processor, write `<stem>.json` to the effective output
//! directory, move the original into `Processed/`. Any failure, whether from
//! the processor or from output I/O, is written to `Errors/<name>.err.txt`
//! and the original stays where it is. A failing job never stops the loop.

use crate::output::{relocate, write_error, write_result};
use crate::processor::{OutDirSource, Processor};
use anyhow::{anyhow, Context, Result};
use docintake_core::{Job, ShutdownSignal, WorkQueue};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

/// Worker behaviour
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Move originals into `Processed/` after success (default: true)
    pub move_original: bool,
    /// Queue poll timeout; bounds shutdown latency (default: 500ms)
    pub poll_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            move_original: true,
            poll_timeout: Duration::from_millis(500),
        }
    }
}

/// What happened to one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        output: PathBuf,
        /// New location of the original, if relocation is enabled
        relocated: Option<PathBuf>,
    },
    Failed {
        error: String,
        /// `None` if even the error report could not be written
        error_file: Option<PathBuf>,
    },
}

/// Single consumer loop over the shared queue
#[derive(Clone)]
pub struct IngestionWorker {
    queue: WorkQueue,
    processor: Arc<dyn Processor>,
    out_dir: Arc<dyn OutDirSource>,
    options: WorkerOptions,
}

impl IngestionWorker {
    pub fn new(
        queue: WorkQueue,
        processor: Arc<dyn Processor>,
        out_dir: Arc<dyn OutDirSource>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            processor,
            out_dir,
            options,
        }
    }

    /// Drain the queue until `shutdown` is triggered
    ///
    /// Returns the number of jobs handled. A job already dequeued is finished
    /// before the signal is observed.
    pub fn run(&self, shutdown: &ShutdownSignal) -> usize {
        let mut handled = 0;
        while !shutdown.is_triggered() {
            let Some(job) = self.queue.pop_timeout(self.options.poll_timeout) else {
                continue;
            };
            self.process_job(&job);
            self.queue.task_done();
            handled += 1;
        }
        handled
    }

    /// Run the worker loop on a named thread
    pub fn spawn(self, name: String, shutdown: ShutdownSignal) -> std::io::Result<JoinHandle<usize>> {
        std::thread::Builder::new()
            .name(name)
            .spawn(move || self.run(&shutdown))
    }

    /// Process one job and write its artifacts
    ///
    /// Does not touch the queue; callers pair it with `task_done`.
    pub fn process_job(&self, job: &Job) -> JobOutcome {
        match self.try_process(job) {
            Ok((output, relocated)) => {
                info!(
                    job_id = %job.id,
                    path = %job.path.display(),
                    output = %output.display(),
                    "processed"
                );
                JobOutcome::Succeeded { output, relocated }
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(
                    job_id = %job.id,
                    path = %job.path.display(),
                    error = %message,
                    "processing failed"
                );
                let error_file = self.record_failure(job, &message);
                JobOutcome::Failed {
                    error: message,
                    error_file,
                }
            }
        }
    }

    fn try_process(&self, job: &Job) -> Result<(PathBuf, Option<PathBuf>)> {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.processor.process(&job.path, &job.recipe_ref)
        }))
        .map_err(|panic| anyhow!("processor panicked: {}", panic_message(&*panic)))??;

        let out_dir = self.effective_out_dir(job)?;
        let payload = result
            .into_payload()
            .context("failed to serialize processing result")?;
        let output = write_result(&out_dir, &job.path, &payload)
            .with_context(|| format!("failed to write result to {}", out_dir.display()))?;

        let relocated = if self.options.move_original {
            let dest = relocate(&job.path)
                .with_context(|| format!("failed to move {}", job.path.display()))?;
            Some(dest)
        } else {
            None
        };

        Ok((output, relocated))
    }

    fn record_failure(&self, job: &Job, message: &str) -> Option<PathBuf> {
        let out_dir = match self.effective_out_dir(job) {
            Ok(dir) => dir,
            Err(e) => {
                error!(job_id = %job.id, error = %format!("{e:#}"), "no output directory for error report");
                return None;
            }
        };

        match write_error(&out_dir, &job.path, message) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(
                    job_id = %job.id,
                    out_dir = %out_dir.display(),
                    error = %e,
                    "failed to write error report"
                );
                None
            }
        }
    }

    fn effective_out_dir(&self, job: &Job) -> Result<PathBuf> {
        match job.out_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => self
                .out_dir
                .resolve_out_dir()
                .context("failed to resolve default output directory"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fixed-size pool of workers sharing one queue and one shutdown signal
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
    shutdown: ShutdownSignal,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one)
    pub fn spawn(worker: IngestionWorker, size: usize, shutdown: ShutdownSignal) -> std::io::Result<Self> {
        let mut handles = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            handles.push(worker.clone().spawn(format!("ingest-{i}"), shutdown.clone())?);
        }
        Ok(Self { handles, shutdown })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Trigger shutdown and wait for every worker; returns total jobs handled
    pub fn shutdown(self) -> usize {
        self.shutdown.trigger();
        self.handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| {
                error!("worker thread panicked");
                0
            }))
            .sum()
    }
}

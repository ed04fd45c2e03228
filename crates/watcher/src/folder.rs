//! Per-folder detection: filter, stabilise, fingerprint, dedup, enqueue

use crate::error::{Result, WatchError};
use crate::filter::FileFilter;
use crate::source::FileEvent;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use docintake_core::{
    fingerprint_file, DedupSet, Fingerprint, IntakeError, Job, ShutdownSignal, Stability,
    StabilityProbe, WorkQueue,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// How often an idle watcher thread re-checks its stop signal
const STOP_POLL: Duration = Duration::from_millis(100);

/// Shared state every folder watcher feeds into
#[derive(Clone)]
pub struct Intake {
    pub queue: WorkQueue,
    pub dedup: Arc<DedupSet>,
    pub filter: Arc<FileFilter>,
    pub probe: StabilityProbe,
}

impl Intake {
    pub fn new(queue: WorkQueue, dedup: Arc<DedupSet>) -> Self {
        Self {
            queue,
            dedup,
            filter: Arc::new(FileFilter::default()),
            probe: StabilityProbe::default(),
        }
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_probe(mut self, probe: StabilityProbe) -> Self {
        self.probe = probe;
        self
    }
}

/// What a single event turned into
#[derive(Debug)]
pub enum Detection {
    /// A new job was pushed onto the queue
    Enqueued(Job),
    /// Name rejected by the filter
    Filtered,
    /// Path is not (or no longer) a regular file
    NotAFile,
    /// Content already seen by this process
    Duplicate(Fingerprint),
    /// Stat or hash failed; the file probably moved away
    Skipped(IntakeError),
    /// Watch stopped while the file was settling
    Cancelled,
}

/// Binds one directory to one recipe reference and optional output override
#[derive(Clone)]
pub struct FolderWatcher {
    key: String,
    folder: PathBuf,
    recipe_ref: String,
    out_dir: Option<PathBuf>,
    intake: Intake,
}

impl FolderWatcher {
    pub fn new(
        key: impl Into<String>,
        folder: PathBuf,
        recipe_ref: impl Into<String>,
        out_dir: Option<PathBuf>,
        intake: Intake,
    ) -> Self {
        Self {
            key: key.into(),
            folder,
            recipe_ref: recipe_ref.into(),
            out_dir,
            intake,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn recipe_ref(&self) -> &str {
        &self.recipe_ref
    }

    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    /// Run one arrival through the detection steps
    ///
    /// Blocks for the stability window. Never fails: detection-layer errors
    /// are reported as [`Detection::Skipped`].
    pub fn handle_event(&self, event: &FileEvent, cancel: &ShutdownSignal) -> Detection {
        let path = &event.path;

        if !self.intake.filter.accepts(path) {
            debug!(key = %self.key, path = %path.display(), "ignored by filter");
            return Detection::Filtered;
        }

        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            _ => return Detection::NotAFile,
        }

        match self.intake.probe.wait(path, cancel) {
            Ok(Stability::Stable) => {}
            Ok(Stability::Cancelled) => return Detection::Cancelled,
            Err(e) => {
                warn!(key = %self.key, error = %e, "skipping file");
                return Detection::Skipped(e);
            }
        }

        let fingerprint = match fingerprint_file(path) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(key = %self.key, error = %e, "skipping file");
                return Detection::Skipped(e);
            }
        };

        if !self.intake.dedup.insert(fingerprint) {
            debug!(
                key = %self.key,
                path = %path.display(),
                fingerprint = %fingerprint,
                "duplicate content, not enqueued"
            );
            return Detection::Duplicate(fingerprint);
        }

        let job = Job::new(
            path.clone(),
            self.recipe_ref.clone(),
            fingerprint,
            self.out_dir.clone(),
        );
        info!(
            key = %self.key,
            job_id = %job.id,
            path = %path.display(),
            fingerprint = %fingerprint,
            "enqueued"
        );
        self.intake.queue.push(job.clone());
        Detection::Enqueued(job)
    }

    /// Start the detection thread for this watcher
    ///
    /// `backlog` paths (from a startup scan) are handled before live events.
    pub fn spawn(self, events: Receiver<FileEvent>, backlog: Vec<FileEvent>) -> Result<WatcherThread> {
        let stop = ShutdownSignal::new();
        let thread_stop = stop.clone();
        let name = format!("watch:{}", self.folder.display());

        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || self.run(events, backlog, thread_stop))
            .map_err(WatchError::Thread)?;

        Ok(WatcherThread { stop, handle })
    }

    fn run(self, events: Receiver<FileEvent>, backlog: Vec<FileEvent>, stop: ShutdownSignal) {
        let mut repeats = RepeatFilter::default();
        for event in &backlog {
            if stop.is_triggered() {
                return;
            }
            self.handle_unless_repeat(event, &stop, &mut repeats);
        }

        loop {
            if stop.is_triggered() {
                break;
            }
            match events.recv_timeout(STOP_POLL) {
                Ok(event) => self.handle_unless_repeat(&event, &stop, &mut repeats),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(key = %self.key, "watcher thread exiting");
    }

    /// Back-to-back events for an unchanged file (a rename reported twice,
    /// a scanned file that is also created) run detection only once
    fn handle_unless_repeat(
        &self,
        event: &FileEvent,
        stop: &ShutdownSignal,
        repeats: &mut RepeatFilter,
    ) {
        if repeats.is_repeat(&event.path) {
            debug!(
                key = %self.key,
                path = %event.path.display(),
                "repeat event, already handled"
            );
            return;
        }
        match self.handle_event(event, stop) {
            Detection::Enqueued(_) | Detection::Duplicate(_) => repeats.record(&event.path),
            _ => repeats.clear(),
        }
    }
}

/// Size and mtime of the last file a watcher thread fingerprinted
#[derive(Debug, Default)]
struct RepeatFilter {
    last: Option<(PathBuf, u64, Option<SystemTime>)>,
}

impl RepeatFilter {
    fn is_repeat(&self, path: &Path) -> bool {
        let Some((last_path, len, modified)) = &self.last else {
            return false;
        };
        if last_path != path {
            return false;
        }
        match std::fs::metadata(path) {
            Ok(meta) => meta.len() == *len && meta.modified().ok() == *modified,
            Err(_) => false,
        }
    }

    fn record(&mut self, path: &Path) {
        self.last = std::fs::metadata(path)
            .ok()
            .map(|meta| (path.to_path_buf(), meta.len(), meta.modified().ok()));
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Handle to a running detection thread
pub struct WatcherThread {
    stop: ShutdownSignal,
    handle: JoinHandle<()>,
}

impl WatcherThread {
    /// Signal the thread and wait for it to exit
    ///
    /// An in-progress stability wait is cancelled; an in-progress hash runs to
    /// completion first.
    pub fn stop(self) {
        self.stop.trigger();
        if self.handle.join().is_err() {
            warn!("watcher thread panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

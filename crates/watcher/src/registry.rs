//! Registry of active folder watches
//!
//! Each watch is keyed by `"<folder>|<recipe_ref>"` and moves between two
//! states only: `Stopped -> Watching -> Stopped`. Starting a key that is
//! already watching is a no-op that returns the same key.

use crate::error::{Result, WatchError};
use crate::folder::{FolderWatcher, Intake, WatcherThread};
use crate::scan::existing_files;
use crate::source::{EventSource, SubscriptionGuard};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Per-watch options beyond folder and recipe
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Output directory override for every job this watch produces
    pub out_dir: Option<PathBuf>,
    /// Feed files already in the folder through detection on start
    pub scan_existing: bool,
}

/// Result of [`WatchRegistry::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub key: String,
    pub status: StartStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// A new observer was created
    Watching,
    /// The key was already active; nothing changed
    AlreadyWatching,
}

/// Result of [`WatchRegistry::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Stopped,
    NotActive,
}

/// Lifecycle state of a watch key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Watching,
}

/// Snapshot of one active watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchInfo {
    pub key: String,
    pub folder: PathBuf,
    pub recipe_ref: String,
    pub out_dir: Option<PathBuf>,
}

struct WatchEntry {
    info: WatchInfo,
    guard: SubscriptionGuard,
    thread: WatcherThread,
}

impl WatchEntry {
    /// Release the OS observation, then wait for the detection thread
    fn shutdown(self) {
        self.guard.unsubscribe();
        self.thread.stop();
        info!(key = %self.info.key, "watch stopped");
    }
}

/// Derive the registry key for a folder/recipe pair
pub fn watch_key(folder: &Path, recipe_ref: &str) -> String {
    format!("{}|{}", folder.display(), recipe_ref)
}

/// Owns every active watch and its OS observation handle
pub struct WatchRegistry {
    source: Arc<dyn EventSource>,
    intake: Intake,
    entries: Mutex<HashMap<String, WatchEntry>>,
}

impl WatchRegistry {
    pub fn new(source: Arc<dyn EventSource>, intake: Intake) -> Self {
        Self {
            source,
            intake,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Shared intake state (queue, dedup set, filter, probe)
    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    /// Start watching `folder` for `recipe_ref`
    pub fn start(
        &self,
        folder: impl AsRef<Path>,
        recipe_ref: &str,
        out_dir: Option<PathBuf>,
    ) -> Result<Started> {
        self.start_with(
            folder,
            recipe_ref,
            WatchOptions {
                out_dir,
                ..WatchOptions::default()
            },
        )
    }

    /// Start watching with explicit options
    ///
    /// Creates the folder if absent. Errors here are configuration errors and
    /// leave the registry unchanged.
    pub fn start_with(
        &self,
        folder: impl AsRef<Path>,
        recipe_ref: &str,
        options: WatchOptions,
    ) -> Result<Started> {
        let folder = folder.as_ref();
        let key = watch_key(folder, recipe_ref);

        // Held across subscribe so two racing starts cannot both observe
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return Ok(Started {
                key,
                status: StartStatus::AlreadyWatching,
            });
        }

        std::fs::create_dir_all(folder).map_err(|source| WatchError::CreateFolder {
            path: folder.to_path_buf(),
            source,
        })?;
        if !folder.is_dir() {
            return Err(WatchError::NotADirectory(folder.to_path_buf()));
        }
        // Jobs carry absolute paths
        let resolved = folder
            .canonicalize()
            .map_err(|source| WatchError::CreateFolder {
                path: folder.to_path_buf(),
                source,
            })?;

        let subscription = self.source.subscribe(&resolved)?;
        let backlog = if options.scan_existing {
            existing_files(&resolved)
        } else {
            Vec::new()
        };

        let watcher = FolderWatcher::new(
            key.clone(),
            resolved.clone(),
            recipe_ref,
            options.out_dir.clone(),
            self.intake.clone(),
        );
        let thread = watcher.spawn(subscription.events, backlog)?;

        info!(
            key = %key,
            folder = %resolved.display(),
            scan_existing = options.scan_existing,
            "watch started"
        );

        entries.insert(
            key.clone(),
            WatchEntry {
                info: WatchInfo {
                    key: key.clone(),
                    folder: resolved,
                    recipe_ref: recipe_ref.to_string(),
                    out_dir: options.out_dir,
                },
                guard: subscription.guard,
                thread,
            },
        );

        Ok(Started {
            key,
            status: StartStatus::Watching,
        })
    }

    /// Stop one watch, blocking until its detection thread has exited
    pub fn stop(&self, key: &str) -> StopStatus {
        let entry = self.entries.lock().remove(key);
        match entry {
            Some(entry) => {
                entry.shutdown();
                StopStatus::Stopped
            }
            None => StopStatus::NotActive,
        }
    }

    /// Stop every watch; returns how many were active
    pub fn stop_all(&self) -> usize {
        let drained: Vec<WatchEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            entry.shutdown();
        }
        count
    }

    /// Snapshot of active keys
    pub fn list(&self) -> BTreeSet<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Snapshot of active watches with their bindings, ordered by key
    pub fn watches(&self) -> Vec<WatchInfo> {
        let mut infos: Vec<_> = self
            .entries
            .lock()
            .values()
            .map(|e| e.info.clone())
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn state(&self, key: &str) -> WatchState {
        if self.entries.lock().contains_key(key) {
            WatchState::Watching
        } else {
            WatchState::Stopped
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

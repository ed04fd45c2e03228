//! Filesystem event sources
//!
//! The watcher only needs "a file appeared in this directory" notifications.
//! [`EventSource`] is the seam: [`NotifySource`] drives the platform
//! mechanism (inotify, FSEvents, ReadDirectoryChangesW) through `notify`, and
//! [`ManualEventSource`] lets a host or a test inject events directly.

use crate::error::{Result, WatchError};
use crossbeam_channel::{Receiver, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A file arrival in a watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Path that changed
    pub path: PathBuf,
    /// How it arrived
    pub kind: FileEventKind,
}

/// Type of arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File created in place
    Created,
    /// File renamed or moved into the directory
    MovedIn,
    /// File found by the startup scan
    Existing,
}

impl FileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileEventKind::Created,
        }
    }

    pub fn moved_in(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileEventKind::MovedIn,
        }
    }
}

/// Keeps an OS-level observation alive; dropping it unsubscribes
pub struct SubscriptionGuard(Box<dyn Send>);

impl SubscriptionGuard {
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self(Box::new(handle))
    }

    /// Release the observation
    pub fn unsubscribe(self) {
        drop(self)
    }
}

/// Event stream for one directory plus the handle that keeps it flowing
pub struct Subscription {
    pub events: Receiver<FileEvent>,
    pub guard: SubscriptionGuard,
}

/// Capability to observe a directory for file arrivals
pub trait EventSource: Send + Sync {
    /// Start observing `dir` (non-recursively)
    fn subscribe(&self, dir: &Path) -> Result<Subscription>;
}

/// Platform event source backed by `notify::RecommendedWatcher`
///
/// Each subscription owns its own watcher, and with it its own notification
/// thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl NotifySource {
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for NotifySource {
    fn subscribe(&self, dir: &Path) -> Result<Subscription> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for file_event in translate(event) {
                        // Receiver gone means the watch is being torn down
                        let _ = tx.send(file_event);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "filesystem watcher error");
                }
            },
        )
        .map_err(|source| WatchError::Subscribe {
            path: dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Subscribe {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Subscription {
            events: rx,
            guard: SubscriptionGuard::new(watcher),
        })
    }
}

/// Map a raw notify event to zero or more arrivals
pub(crate) fn translate(event: notify::Event) -> Vec<FileEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(FileEvent::created).collect(),
        // Paired rename: paths are [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .into_iter()
            .last()
            .map(FileEvent::moved_in)
            .into_iter()
            .collect(),
        // Unpaired or platform-ambiguous renames; the watcher discards paths
        // that are no longer regular files
        EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.into_iter().map(FileEvent::moved_in).collect()
        }
        _ => Vec::new(),
    }
}

type SenderMap = HashMap<PathBuf, Vec<(u64, Sender<FileEvent>)>>;

/// In-process event source fed by [`ManualEventSource::emit`]
#[derive(Clone, Default)]
pub struct ManualEventSource {
    senders: Arc<Mutex<SenderMap>>,
    next_id: Arc<AtomicU64>,
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every subscriber of `dir`
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, dir: &Path, event: FileEvent) -> usize {
        let senders = self.senders.lock();
        let Some(subscribers) = senders.get(dir) else {
            return 0;
        };
        subscribers
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn subscriber_count(&self, dir: &Path) -> usize {
        self.senders.lock().get(dir).map_or(0, Vec::len)
    }
}

struct ManualGuard {
    dir: PathBuf,
    id: u64,
    senders: Arc<Mutex<SenderMap>>,
}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        let mut senders = self.senders.lock();
        if let Some(subscribers) = senders.get_mut(&self.dir) {
            subscribers.retain(|(id, _)| *id != self.id);
            if subscribers.is_empty() {
                senders.remove(&self.dir);
            }
        }
    }
}

impl EventSource for ManualEventSource {
    fn subscribe(&self, dir: &Path) -> Result<Subscription> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.senders
            .lock()
            .entry(dir.to_path_buf())
            .or_default()
            .push((id, tx));

        Ok(Subscription {
            events: rx,
            guard: SubscriptionGuard::new(ManualGuard {
                dir: dir.to_path_buf(),
                id,
                senders: Arc::clone(&self.senders),
            }),
        })
    }
}

//! Folder watching for docintake
//!
//! This crate turns file arrivals into ingestion jobs:
//! - Extension allow-list and temp-file filtering
//! - Pluggable event sources (`notify` backed, or manual injection)
//! - Per-folder detection threads (stabilise, fingerprint, dedup, enqueue)
//! - Registry of active watches keyed by folder and recipe

pub mod error;
pub mod filter;
pub mod folder;
pub mod registry;
pub mod scan;
pub mod source;

pub use error::{Result, WatchError};
pub use filter::{FileFilter, FilterConfig, DEFAULT_EXTENSIONS};
pub use folder::{Detection, FolderWatcher, Intake, WatcherThread};
pub use registry::{
    watch_key, StartStatus, Started, StopStatus, WatchInfo, WatchOptions, WatchRegistry,
    WatchState,
};
pub use source::{
    EventSource, FileEvent, FileEventKind, ManualEventSource, NotifySource, Subscription,
    SubscriptionGuard,
};

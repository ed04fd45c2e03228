//! Watch management errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced synchronously to callers of the registry
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create watch folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch target is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to observe {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("invalid ignore pattern '{0}': {1}")]
    Pattern(String, #[source] ignore::Error),

    #[error("failed to spawn watcher thread: {0}")]
    Thread(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;

//! Detection-layer errors

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while examining a candidate file
///
/// Callers on the detection path treat every variant as "skip this event":
/// the file may have been moved or deleted since the notification fired.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} did not stabilise within {polls} polls", path.display())]
    Unstable { path: PathBuf, polls: u32 },
}

impl IntakeError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;

//! Ingestion job model

use crate::hash::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// One unit of ingestion work
///
/// Created by a folder watcher the moment a file is judged stable and not
/// seen before, consumed exactly once by a worker, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier for log correlation only
    pub id: Ulid,
    /// Absolute path of the source file
    pub path: PathBuf,
    /// Opaque processing configuration reference (id or recipe file path)
    pub recipe_ref: String,
    /// Content digest computed after stabilisation
    pub fingerprint: Fingerprint,
    /// Per-watch output override; `None` uses the default output directory
    pub out_dir: Option<PathBuf>,
}

impl Job {
    pub fn new(
        path: PathBuf,
        recipe_ref: impl Into<String>,
        fingerprint: Fingerprint,
        out_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            path,
            recipe_ref: recipe_ref.into(),
            fingerprint,
            out_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

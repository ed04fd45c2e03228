//! Processing and output-location capabilities supplied by the host

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Result of processing one document
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutput {
    /// Structured value, written as pretty-printed JSON
    Structured(serde_json::Value),
    /// Pre-serialized payload, written verbatim
    Text(String),
}

impl ProcessOutput {
    /// Bytes to write to the `.json` artifact
    pub fn into_payload(self) -> serde_json::Result<String> {
        match self {
            ProcessOutput::Structured(value) => serde_json::to_string_pretty(&value),
            ProcessOutput::Text(text) => Ok(text),
        }
    }
}

impl From<serde_json::Value> for ProcessOutput {
    fn from(value: serde_json::Value) -> Self {
        ProcessOutput::Structured(value)
    }
}

impl From<String> for ProcessOutput {
    fn from(text: String) -> Self {
        ProcessOutput::Text(text)
    }
}

impl From<&str> for ProcessOutput {
    fn from(text: &str) -> Self {
        ProcessOutput::Text(text.to_string())
    }
}

/// External document processor (OCR engine or equivalent)
///
/// Returning `Err` is the only failure signal. Called from worker threads;
/// with a pool of more than one worker it must tolerate concurrent calls.
pub trait Processor: Send + Sync {
    fn process(&self, path: &Path, recipe_ref: &str) -> Result<ProcessOutput>;
}

impl<F> Processor for F
where
    F: Fn(&Path, &str) -> Result<ProcessOutput> + Send + Sync,
{
    fn process(&self, path: &Path, recipe_ref: &str) -> Result<ProcessOutput> {
        self(path, recipe_ref)
    }
}

/// Default output directory for jobs without a per-watch override
///
/// Resolved on every job so configuration edits take effect without restart.
pub trait OutDirSource: Send + Sync {
    fn resolve_out_dir(&self) -> Result<PathBuf>;
}

/// Constant output directory
#[derive(Debug, Clone)]
pub struct FixedOutDir(pub PathBuf);

impl FixedOutDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl OutDirSource for FixedOutDir {
    fn resolve_out_dir(&self) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

impl<F> OutDirSource for F
where
    F: Fn() -> Result<PathBuf> + Send + Sync,
{
    fn resolve_out_dir(&self) -> Result<PathBuf> {
        self()
    }
}

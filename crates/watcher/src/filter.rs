//! Candidate file filtering
//!
//! Decides from the file name alone whether a path is worth probing:
//! 1. Temp/partial conventions (`.tmp`, `.part`, `~$` lock files) - always rejected
//! 2. Extra gitignore-style patterns from config
//! 3. Extension allow-list (case-insensitive)

use crate::error::{Result, WatchError};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Extensions accepted when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff"];

/// Filter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Allowed extensions, with or without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Additional patterns to reject (gitignore syntax, matched on file name)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_patterns: vec![],
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

/// Compiled filter shared by every folder watcher
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: HashSet<String>,
    extra: Option<Gitignore>,
}

impl FileFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let extensions = config
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let extra = if config.ignore_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new("");
            for pattern in &config.ignore_patterns {
                builder
                    .add_line(None, pattern)
                    .map_err(|e| WatchError::Pattern(pattern.clone(), e))?;
            }
            Some(
                builder
                    .build()
                    .map_err(|e| WatchError::Pattern(config.ignore_patterns.join(", "), e))?,
            )
        };

        Ok(Self { extensions, extra })
    }

    /// Check whether a path names an ingestible document
    ///
    /// Does not touch the filesystem; the caller still checks that the path
    /// is a regular file.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if is_temp_name(name) {
            return false;
        }

        if let Some(ref extra) = self.extra {
            if extra.matched(Path::new(name), false).is_ignore() {
                return false;
            }
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.contains(&ext.to_ascii_lowercase()),
            None => false,
        }
    }

    /// Number of allowed extensions
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            extensions: default_extensions().into_iter().collect(),
            extra: None,
        }
    }
}

/// Partial downloads and office lock files
fn is_temp_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tmp") || lower.ends_with(".part") || name.starts_with("~$")
}

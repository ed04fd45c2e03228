//! Startup scan of files already sitting in a watched folder
//!
//! Notifications only cover arrivals after the watch starts. Documents dropped
//! while the daemon was down are picked up by listing the folder once and
//! feeding each entry through the normal detection path.

use crate::source::{FileEvent, FileEventKind};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Regular files directly inside `folder`, ordered by file name
pub fn existing_files(folder: &Path) -> Vec<FileEvent> {
    let mut found = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "startup scan entry failed");
                continue;
            }
        };

        // Only check files
        if !entry.file_type().is_file() {
            continue;
        }

        found.push(FileEvent {
            path: entry.into_path(),
            kind: FileEventKind::Existing,
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lists_top_level_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("b.pdf"), b"b").unwrap();
        fs::write(root.join("a.pdf"), b"a").unwrap();
        fs::create_dir(root.join("Processed")).unwrap();
        fs::write(root.join("Processed/old.pdf"), b"old").unwrap();

        let found = existing_files(root);
        let names: Vec<_> = found
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert!(found.iter().all(|e| e.kind == FileEventKind::Existing));
    }

    #[test]
    fn test_missing_folder_yields_nothing() {
        assert!(existing_files(Path::new("/no/such/inbox")).is_empty());
    }
}

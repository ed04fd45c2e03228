//! On-disk artifacts: result JSON, error text, relocated originals

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Subdirectory (beside the original) that successfully processed files move into
pub const PROCESSED_DIR: &str = "Processed";

/// Subdirectory of the output directory holding failure reports
pub const ERRORS_DIR: &str = "Errors";

/// Write `<out_dir>/<stem>.json`, replacing any existing file
pub fn write_result(out_dir: &Path, source: &Path, payload: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let target = out_dir.join(with_suffix(stem_of(source), ".json"));
    fs::write(&target, payload.as_bytes())?;
    Ok(target)
}

/// Write `<out_dir>/Errors/<name>.err.txt`
pub fn write_error(out_dir: &Path, source: &Path, message: &str) -> io::Result<PathBuf> {
    let err_dir = out_dir.join(ERRORS_DIR);
    fs::create_dir_all(&err_dir)?;
    let name = source.file_name().map(OsString::from).unwrap_or_default();
    let target = err_dir.join(with_suffix(name, ".err.txt"));
    fs::write(&target, message.as_bytes())?;
    Ok(target)
}

/// Move `source` into the `Processed` folder beside it
///
/// Name collisions resolve to `name (1).ext`, `name (2).ext`, and so on. The
/// free-name scan is not atomic against other writers to `Processed`.
pub fn relocate(source: &Path) -> io::Result<PathBuf> {
    let parent = source.parent().unwrap_or_else(|| Path::new("."));
    let processed = parent.join(PROCESSED_DIR);
    fs::create_dir_all(&processed)?;

    let dest = unique_destination(&processed, source);
    fs::rename(source, &dest)?;
    Ok(dest)
}

/// First free name for `source`'s file name inside `dir`
pub fn unique_destination(dir: &Path, source: &Path) -> PathBuf {
    let file_name = source.file_name().map(OsString::from).unwrap_or_default();
    let candidate = dir.join(&file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = stem_of(source);
    let ext = source.extension();
    let mut i = 1u32;
    loop {
        let mut name = stem.clone();
        name.push(format!(" ({i})"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

fn stem_of(path: &Path) -> OsString {
    path.file_stem().map(OsString::from).unwrap_or_default()
}

fn with_suffix(mut name: OsString, suffix: &str) -> OsString {
    name.push(suffix);
    name
}

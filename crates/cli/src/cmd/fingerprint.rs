//! Print content fingerprints as the deduplicator sees them

use anyhow::{Context, Result};
use docintake_core::fingerprint_file;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::path::PathBuf;

pub fn run(files: &[PathBuf]) -> Result<()> {
    let mut first_seen: HashMap<_, &PathBuf> = HashMap::new();

    for file in files {
        let fp = fingerprint_file(file)
            .with_context(|| format!("Failed to fingerprint {}", file.display()))?;

        match first_seen.get(&fp) {
            Some(original) => println!(
                "{}  {} {}",
                fp.to_hex(),
                file.display(),
                format!("(duplicate of {})", original.display()).yellow()
            ),
            None => {
                println!("{}  {}", fp.to_hex(), file.display());
                first_seen.insert(fp, file);
            }
        }
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::warn;

use crate::record::MetadataRecord;

const ABOUT_EXTENSION: &str = ".about";

fn is_about_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().ends_with(ABOUT_EXTENSION))
}

/// Find every `.ABOUT` file under `path`, sorted. A file path is returned
/// as is.
pub fn collect_about_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Inventory location {} does not exist", path.display());
    }

    let mut found = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if is_about_file(&entry_path) {
                found.push(entry_path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Load every record found under `path`, in path order.
pub fn load_inventory(path: &Path) -> Result<Vec<MetadataRecord>> {
    Ok(collect_about_files(path)?
        .iter()
        .map(|location| MetadataRecord::load(location))
        .collect())
}

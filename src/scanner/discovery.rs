use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collect candidate photos across the configured source folders.
///
/// Extensions are matched case-insensitively without the leading dot. A
/// source folder that does not exist aborts discovery; there is nothing
/// sensible to process when the configuration points at a missing tree.
pub fn discover_photos(folders: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut photos = Vec::new();

    for folder in folders {
        if !folder.is_dir() {
            bail!("Source folder {} is missing or not a directory", folder.display());
        }

        for entry in WalkDir::new(folder)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if path.is_file() && has_allowed_extension(path, extensions) {
                photos.push(path.to_path_buf());
            }
        }
    }

    // Sort by path for consistent ordering
    photos.sort();

    Ok(photos)
}

pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.to_lowercase() == ext_lower)
        }
        None => false,
    }
}

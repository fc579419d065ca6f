//! Append-only record of processed photos.
//!
//! The ledger is a plain-text file with one line per processed photo,
//! formatted as `<sha256-hex>:<original source path>`. Lines are only ever
//! appended; the full history is the file's content, so it stays greppable
//! and safe to inspect by hand.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// SHA-256 over the path *string*, lowercase hex.
///
/// Photos are identified by where they were found, not by their bytes: the
/// same file re-imported from a different location counts as a new photo.
pub fn path_digest(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every recorded digest. A ledger file that does not exist yet
    /// reads as empty, not as an error.
    pub fn digests(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ledger {}", self.path.display()))?;

        let digests = content
            .lines()
            .filter_map(|line| line.split(':').next())
            .filter(|digest| !digest.is_empty())
            .map(|digest| digest.to_string())
            .collect();

        Ok(digests)
    }

    /// Check whether a digest has been recorded. Always re-reads the file,
    /// so appends made by this process are visible immediately.
    pub fn contains_digest(&self, digest: &str) -> Result<bool> {
        Ok(self.digests()?.contains(digest))
    }

    /// Append one entry and sync it to disk before returning.
    pub fn append(&self, digest: &str, source: &Path) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory {}", parent.display())
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;

        writeln!(file, "{}:{}", digest, source.display())
            .context("Failed to write ledger entry")?;
        file.sync_all().context("Failed to sync ledger to disk")?;

        Ok(())
    }
}

//! Canonical archive naming.
//!
//! Every archived photo is named after its capture timestamp, so the target
//! path is a pure function of when the photo was taken. Two photos taken in
//! the same second map to the same name; the pipeline treats that as a
//! documented overwrite, not an error.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Archive filename for a capture timestamp: `photo-YYYYMMDD-HHMMSS.jpg`.
/// Sub-second precision is dropped.
pub fn target_filename(taken_at: NaiveDateTime) -> String {
    format!("photo-{}.jpg", taken_at.format("%Y%m%d-%H%M%S"))
}

/// Full target path under the archive folder.
pub fn target_path(target_folder: &Path, taken_at: NaiveDateTime) -> PathBuf {
    target_folder.join(target_filename(taken_at))
}

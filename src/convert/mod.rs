//! Image conversion into the archive.
//!
//! JPEG sources are copied byte-for-byte. Anything else is decoded and
//! re-encoded as JPEG, then the original metadata tags are copied onto the
//! output with exiftool, since re-encoding alone drops them.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;

use crate::config::ConvertConfig;

/// Writes archive copies of source photos. The pipeline only depends on this
/// trait so tests can exercise the ingest logic without decoding real raws.
pub trait Converter: Send + Sync {
    /// Byte-exact copy, for sources that are already JPEG-encoded.
    fn copy(&self, source: &Path, target: &Path) -> Result<()>;

    /// Decode, re-encode as JPEG, and re-apply the source's metadata tags.
    fn reencode(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Whether a source file is already JPEG-encoded, judged by extension.
pub fn is_jpeg(path: &Path) -> bool {
    matches!(
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref(),
        Some("jpg") | Some("jpeg")
    )
}

pub struct ImageConverter {
    config: ConvertConfig,
}

impl ImageConverter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    fn encode_jpeg(&self, source: &Path, target: &Path) -> Result<()> {
        let img = image::open(source)
            .with_context(|| format!("Failed to decode {}", source.display()))?;

        let file = File::create(target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.config.jpeg_quality);

        // JPEG has no alpha channel
        let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
        rgb.write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode {}", target.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", target.display()))?;

        Ok(())
    }

    /// Copy metadata tags from the source onto the re-encoded target.
    fn retag(&self, source: &Path, target: &Path) -> Result<()> {
        let output = Command::new(&self.config.exiftool)
            .arg("-tagsFromFile")
            .arg(source)
            .arg("-overwrite_original")
            .arg(target)
            .output()
            .with_context(|| format!("Failed to run {}", self.config.exiftool))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.config.exiftool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(())
    }
}

impl Converter for ImageConverter {
    fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        std::fs::copy(source, target).with_context(|| {
            format!("Failed to copy {} to {}", source.display(), target.display())
        })?;
        Ok(())
    }

    fn reencode(&self, source: &Path, target: &Path) -> Result<()> {
        let result = self
            .encode_jpeg(source, target)
            .and_then(|_| self.retag(source, target));

        if result.is_err() && target.exists() {
            // Remove the partial output so the next run retries this file
            // instead of short-circuiting on the target-exists check.
            if let Err(e) = std::fs::remove_file(target) {
                tracing::warn!("Failed to remove partial output {}: {}", target.display(), e);
            }
        }

        result
    }
}

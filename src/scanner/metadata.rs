use anyhow::Result;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct PhotoMetadata {
    // Image dimensions
    pub width: Option<u32>,
    pub height: Option<u32>,

    // Camera info
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,

    // Date/time original, as free-form text from the EXIF field
    pub taken_at: Option<String>,
}

impl PhotoMetadata {
    /// Capture timestamp parsed to whole-second precision, if present and
    /// parsable.
    pub fn taken_at_datetime(&self) -> Option<NaiveDateTime> {
        self.taken_at.as_deref().and_then(parse_taken_at)
    }
}

/// Source of photo metadata. The pipeline only depends on this trait so
/// tests can supply fixed timestamps without real camera files.
pub trait MetadataSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<PhotoMetadata>;
}

/// EXIF-backed metadata extraction.
pub struct ExifSource;

impl MetadataSource for ExifSource {
    fn extract(&self, path: &Path) -> Result<PhotoMetadata> {
        let mut metadata = PhotoMetadata::default();

        // Get image dimensions
        if let Ok(reader) = image::ImageReader::open(path) {
            if let Ok(dims) = reader.into_dimensions() {
                metadata.width = Some(dims.0);
                metadata.height = Some(dims.1);
            }
        }

        // Extract EXIF data
        let file = File::open(path)?;
        let mut bufreader = BufReader::new(file);
        if let Ok(exif) = exif::Reader::new().read_from_container(&mut bufreader) {
            // Camera make
            if let Some(field) = exif.get_field(exif::Tag::Make, exif::In::PRIMARY) {
                metadata.camera_make =
                    Some(field.display_value().to_string().trim_matches('"').to_string());
            }

            // Camera model
            if let Some(field) = exif.get_field(exif::Tag::Model, exif::In::PRIMARY) {
                metadata.camera_model =
                    Some(field.display_value().to_string().trim_matches('"').to_string());
            }

            // Date taken
            if let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) {
                metadata.taken_at =
                    Some(field.display_value().to_string().trim_matches('"').to_string());
            }
        }

        Ok(metadata)
    }
}

/// Parse the free-form capture timestamp text into a calendar timestamp.
///
/// Cameras write `YYYY:MM:DD HH:MM:SS`; other tools rewrite the field with
/// dashes or an ISO `T` separator, so all three are accepted.
pub fn parse_taken_at(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_matches('"').trim();

    const FORMATS: [&str; 4] = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub convert: ConvertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Folders scanned recursively for candidate photos.
    #[serde(default = "default_source_folders")]
    pub source_folders: Vec<PathBuf>,

    /// Flat archive folder the renamed JPEGs land in.
    #[serde(default = "default_target_folder")]
    pub target_folder: PathBuf,

    /// Append-only record of processed photos.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Extension allow-list, matched case-insensitively without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_source_folders() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_target_folder() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("processed_photos")
}

fn default_ledger_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shoebox")
        .join("processed.txt")
}

fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "nef".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_folders: default_source_folders(),
            target_folder: default_target_folder(),
            ledger_path: default_ledger_path(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// JPEG quality used when re-encoding non-JPEG sources (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Binary invoked to copy metadata tags onto re-encoded output.
    #[serde(default = "default_exiftool")]
    pub exiftool: String,
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_exiftool() -> String {
    "exiftool".to_string()
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            exiftool: default_exiftool(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shoebox")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

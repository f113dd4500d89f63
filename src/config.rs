//! Kernel configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{AppError, Result};

/// Largest artifact edge, in pixels, accepted by validation.
pub const MAX_ARTIFACT_EDGE: u32 = 4096;

/// Rendered artifact dimensions.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactConfig {
    /// Canvas width in pixels.
    #[serde(default = "default_artifact_width")]
    pub width: u32,
    /// Canvas height in pixels.
    #[serde(default = "default_artifact_height")]
    pub height: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            width: default_artifact_width(),
            height: default_artifact_height(),
        }
    }
}

fn default_artifact_width() -> u32 {
    640
}

fn default_artifact_height() -> u32 {
    480
}

fn default_dataset_binding() -> String {
    "df".into()
}

fn default_max_line_bytes() -> usize {
    16 * 1_048_576
}

fn default_csv_delimiter() -> char {
    ','
}

/// Kernel configuration, optionally parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct KernelConfig {
    /// Reserved identifier the preloaded dataset is published under.
    #[serde(default = "default_dataset_binding")]
    pub dataset_binding: String,
    /// Longest inbound command line accepted, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Field delimiter used when parsing the dataset.
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
    /// Artifact rendering settings.
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            dataset_binding: default_dataset_binding(),
            max_line_bytes: default_max_line_bytes(),
            csv_delimiter: default_csv_delimiter(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The delimiter as the single byte the CSV reader expects.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.csv_delimiter).unwrap_or(b',')
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.dataset_binding) {
            return Err(AppError::Config(format!(
                "dataset_binding must be an identifier, got '{}'",
                self.dataset_binding
            )));
        }

        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if !self.csv_delimiter.is_ascii() || self.csv_delimiter == '\n' {
            return Err(AppError::Config(format!(
                "csv_delimiter must be a single ASCII character, got {:?}",
                self.csv_delimiter
            )));
        }

        let ArtifactConfig { width, height } = self.artifacts;
        if width == 0 || height == 0 || width > MAX_ARTIFACT_EDGE || height > MAX_ARTIFACT_EDGE {
            return Err(AppError::Config(format!(
                "artifact size {width}x{height} outside 1..={MAX_ARTIFACT_EDGE}"
            )));
        }

        Ok(())
    }
}

/// Whether `name` is usable as a binding in executed code.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

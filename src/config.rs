//! # Configuration Module
//!
//! Batch-level options, validated once before any file is touched. Options
//! can be loaded from and saved to a JSON file so a run is reproducible.

use crate::error::AnalyzeError;
use crate::frames::{MAX_FRAME_RATE, MIN_FRAME_RATE};
use crate::strategy::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options governing one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Attempt repair of corrupted files (analysis-only when false)
    #[serde(default)]
    pub repair: bool,

    /// Root directory for organized output (corrupt/, fixed/,
    /// extracted_frames/). Required whenever repair is enabled.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Target format for repaired files
    #[serde(default = "default_format")]
    pub output_format: OutputFormat,

    /// Salvage still frames from files no strategy could repair
    #[serde(default)]
    pub extract_frames_on_failure: bool,

    /// Sampling rate for salvage extraction, frames per second
    #[serde(default = "default_frame_rate")]
    pub failure_frame_rate: f64,
}

fn default_format() -> OutputFormat {
    OutputFormat::H264Mp4
}

fn default_frame_rate() -> f64 {
    1.0
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            repair: false,
            output_dir: None,
            output_format: default_format(),
            extract_frames_on_failure: false,
            failure_frame_rate: default_frame_rate(),
        }
    }
}

impl BatchOptions {
    /// Validate option consistency. Directory writability is proven later
    /// by the organizer; this only catches contradictions.
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        if self.repair && self.output_dir.is_none() {
            return Err(AnalyzeError::Validation(
                "Repair requires an output directory".to_string(),
            ));
        }
        if self.extract_frames_on_failure && !self.repair {
            return Err(AnalyzeError::Validation(
                "Frame extraction only applies when repair is enabled".to_string(),
            ));
        }
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&self.failure_frame_rate) {
            return Err(AnalyzeError::Validation(format!(
                "Frame rate must be between {} and {}",
                MIN_FRAME_RATE, MAX_FRAME_RATE
            )));
        }
        Ok(())
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, AnalyzeError> {
        let content = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&content)
            .map_err(|e| AnalyzeError::Validation(format!("Invalid options file: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), AnalyzeError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AnalyzeError::Validation(format!("Cannot serialize options: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_analysis_only() {
        let options = BatchOptions::default();
        assert!(!options.repair);
        assert!(options.validate().is_ok());
        assert_eq!(options.output_format, OutputFormat::H264Mp4);
    }

    #[test]
    fn test_repair_requires_output_dir() {
        let options = BatchOptions {
            repair: true,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_frame_extraction_requires_repair() {
        let options = BatchOptions {
            extract_frames_on_failure: true,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");

        let options = BatchOptions {
            repair: true,
            output_dir: Some(PathBuf::from("/videos/out")),
            output_format: OutputFormat::ProResMov,
            extract_frames_on_failure: true,
            failure_frame_rate: 0.5,
        };
        options.save_to_file(&path).unwrap();

        let loaded = BatchOptions::from_file(&path).unwrap();
        assert!(loaded.repair);
        assert_eq!(loaded.output_format, OutputFormat::ProResMov);
        assert_eq!(loaded.failure_frame_rate, 0.5);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"repair": false}"#).unwrap();

        let loaded = BatchOptions::from_file(&path).unwrap();
        assert_eq!(loaded.failure_frame_rate, 1.0);
        assert_eq!(loaded.output_format, OutputFormat::H264Mp4);
    }
}

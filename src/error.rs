//! # Error Types Module
//!
//! This module defines all custom error types of the application.
//!
//! ## Responsibilities:
//! - Defines the `AnalyzeError` enum categorizing every failure mode
//! - Integrates with `thiserror` for automatic error conversion
//! - Maps raw OS error codes to human-readable messages
//!
//! ## Error categories:
//! - `Io`: I/O errors (file not found, permissions, etc.)
//! - `ToolNotFound`: FFmpeg/FFprobe could not be located (batch-fatal)
//! - `SpawnFailure`: an external process could not be started
//! - `ProcessTerminated`: process killed by a cancellation request
//! - `InvalidPath`: traversal, null byte, relative or oversized path
//! - `UnsupportedExtension`: file extension outside the supported set
//! - `OutputTooSmall`: repair output below the viability threshold
//! - `UnknownStrategy`: repair strategy name not recognized
//! - `OrganizeFailure`: copy/verify/delete move sequence failed
//! - `MisconfiguredOutputDirectory`: output dir missing or not writable
//!   (batch-fatal)
//!
//! ## Propagation policy:
//! - Classification and repair failures are captured into per-file result
//!   objects, never thrown past the per-file boundary
//! - `ToolNotFound` and `MisconfiguredOutputDirectory` abort the whole
//!   batch before any file is processed

/// Custom error types for video analysis and repair
#[derive(thiserror::Error, Debug)]
pub enum AnalyzeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to start process: {0}")]
    SpawnFailure(String),

    #[error("Process terminated by cancellation request")]
    ProcessTerminated,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Output file too small: {0} bytes")]
    OutputTooSmall(u64),

    #[error("Unknown repair strategy: {0}")]
    UnknownStrategy(String),

    #[error("File organization failed: {0}")]
    OrganizeFailure(String),

    #[error("Output directory misconfigured: {0}")]
    MisconfiguredOutputDirectory(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AnalyzeError {
    /// Human-readable message for display, with raw OS error codes mapped
    /// to descriptive text instead of errno strings.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::Io(e) => user_friendly_io(e),
            AnalyzeError::ToolNotFound(_) => format!(
                "{}. Please install FFmpeg and ensure it's in your PATH.",
                self
            ),
            other => other.to_string(),
        }
    }
}

/// Map an I/O error to a descriptive message.
pub fn user_friendly_io(error: &std::io::Error) -> String {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::NotFound => {
            "File or directory not found. Please check the path and try again.".to_string()
        }
        ErrorKind::PermissionDenied => {
            "Permission denied. Please check file permissions.".to_string()
        }
        _ => match error.raw_os_error() {
            // ENOSPC
            Some(28) => "Not enough disk space to complete operation.".to_string(),
            // EMFILE
            Some(24) => {
                "Too many files open. Please close some applications and try again.".to_string()
            }
            _ => format!("An error occurred: {}. Please try again.", error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_not_found_is_descriptive() {
        let err = AnalyzeError::Io(Error::new(ErrorKind::NotFound, "ENOENT"));
        let msg = err.user_message();
        assert!(msg.contains("File or directory not found"));
        assert!(!msg.contains("ENOENT"));
    }

    #[test]
    fn test_permission_denied_is_descriptive() {
        let err = AnalyzeError::Io(Error::new(ErrorKind::PermissionDenied, "EACCES"));
        assert!(err.user_message().contains("Permission denied"));
    }

    #[test]
    fn test_tool_not_found_suggests_install() {
        let err = AnalyzeError::ToolNotFound("ffmpeg".to_string());
        assert!(err.user_message().contains("install FFmpeg"));
    }
}

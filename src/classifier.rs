//! # File Classification Module
//!
//! Runs the two-stage validation on one video file and produces a
//! `CorruptionAssessment`.
//!
//! ## Pipeline per file:
//! 1. **Probe pass**: ffprobe with structured (JSON) format/stream output
//!    and error reporting; captures exit code and diagnostic text
//! 2. **Decode pass**: ffmpeg in decode-only mode (`-f null -`), forcing a
//!    full read/decode of every frame; surfaces mid-stream corruption the
//!    probe alone would miss
//!
//! Both passes complete before the decision table runs. The table is
//! evaluated in order, first match wins:
//!
//! | condition                                | level    |
//! |------------------------------------------|----------|
//! | both exits 0, no diagnostics             | none     |
//! | "moov atom not found" in diagnostics     | severe   |
//! | "Invalid data" in diagnostics            | severe   |
//! | "Could not find codec" in diagnostics    | moderate |
//! | any non-zero exit or any diagnostics     | moderate |
//!
//! A classifier whose own process invocations fail to spawn reports
//! `success = false` with severity `severe`, a distinct path from "the file
//! is severely corrupted", kept distinguishable through the `success` flag
//! even though both render identically to the user.

use crate::error::AnalyzeError;
use crate::file_organizer;
use crate::process_runner::{ProcessRunner, RunOutcome};
use crate::strategy::CorruptionLevel;
use crate::tool_resolver::ToolPaths;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of analyzing one file. Immutable once produced; batch-level
/// bookkeeping lives in `BatchItemOutcome`, never here.
#[derive(Debug, Clone, Serialize)]
pub struct CorruptionAssessment {
    pub file: PathBuf,
    pub corruption_level: CorruptionLevel,
    pub repair_feasible: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// Whether the assessment itself completed, independent of file health
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CorruptionAssessment {
    /// Assessment for a file whose analysis could not be carried out at all
    /// (invalid path, spawn failure). Collapsed into `Severe` so downstream
    /// consumers treat it as requiring attention, but `success = false`
    /// keeps "could not analyze" separate from "confirmed corrupted".
    fn failed(file: PathBuf, error: String, issue: &str) -> Self {
        Self {
            file,
            corruption_level: CorruptionLevel::Severe,
            repair_feasible: false,
            issues: vec![issue.to_string()],
            recommendations: vec!["Please check the file and try again".to_string()],
            success: false,
            error: Some(error),
        }
    }
}

/// Exit code plus diagnostic text of one external pass
#[derive(Debug, Clone)]
struct PassResult {
    code: i32,
    diagnostics: String,
}

/// Classifies video files via probe + decode passes
pub struct FileClassifier {
    tools: ToolPaths,
}

impl FileClassifier {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Analyze one file. Never returns an error: every failure mode is
    /// captured in the assessment so one bad file cannot abort a batch.
    pub async fn classify(&self, runner: &ProcessRunner, file: &Path) -> CorruptionAssessment {
        debug!("Analyzing: {}", file.display());

        // Re-validated here even for caller-supplied paths: the pipeline
        // mutates the filesystem it is walking
        let file = match validate_video_file(file) {
            Ok(path) => path,
            Err(e) => {
                return CorruptionAssessment::failed(
                    file.to_path_buf(),
                    e.user_message(),
                    "Analysis failed",
                );
            }
        };

        // Probe pass
        let probe_args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_error".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            file.to_string_lossy().to_string(),
        ];
        let probe = match self.pass_result(runner, &self.tools.prober, &probe_args).await {
            Ok(result) => result,
            Err(e) => {
                return CorruptionAssessment::failed(file, e.user_message(), "Failed to probe file");
            }
        };

        // Decode pass: discard all output, error-level diagnostics only
        let decode_args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            file.to_string_lossy().to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];
        let decode = match self.pass_result(runner, &self.tools.encoder, &decode_args).await {
            Ok(result) => result,
            Err(e) => {
                return CorruptionAssessment::failed(file, e.user_message(), "Failed to analyze file");
            }
        };

        let assessment = evaluate(file, &probe, &decode);
        debug!(
            "Analysis complete: {} (corruption: {}, repairable: {})",
            assessment.file.display(),
            assessment.corruption_level,
            assessment.repair_feasible
        );
        assessment
    }

    async fn pass_result(
        &self,
        runner: &ProcessRunner,
        tool: &Path,
        args: &[String],
    ) -> Result<PassResult, AnalyzeError> {
        match runner.run(tool, args).await {
            RunOutcome::Exited { code, stderr, .. } => Ok(PassResult {
                code,
                diagnostics: stderr,
            }),
            RunOutcome::SpawnFailed { error } => Err(AnalyzeError::SpawnFailure(error)),
            RunOutcome::Terminated => Err(AnalyzeError::ProcessTerminated),
        }
    }
}

/// Decision table over the two completed passes, in order, first match wins.
fn evaluate(file: PathBuf, probe: &PassResult, decode: &PassResult) -> CorruptionAssessment {
    let mut assessment = CorruptionAssessment {
        file,
        corruption_level: CorruptionLevel::None,
        repair_feasible: false,
        issues: Vec::new(),
        recommendations: Vec::new(),
        success: true,
        error: None,
    };

    let probe_diag = probe.diagnostics.trim();
    let decode_diag = decode.diagnostics.trim();

    if probe.code == 0 && decode.code == 0 && probe_diag.is_empty() && decode_diag.is_empty() {
        // Healthy
        return assessment;
    }

    assessment.corruption_level = CorruptionLevel::Moderate;
    assessment.repair_feasible = true;

    let all_diagnostics = format!("{}{}", decode.diagnostics, probe.diagnostics);

    if all_diagnostics.contains("moov atom not found") {
        assessment.corruption_level = CorruptionLevel::Severe;
        assessment.issues.push("Missing moov atom".to_string());
    } else if all_diagnostics.contains("Invalid data") {
        assessment.corruption_level = CorruptionLevel::Severe;
        assessment.issues.push("Invalid data in file".to_string());
    } else if all_diagnostics.contains("Could not find codec") {
        assessment.issues.push("Codec issues detected".to_string());
    } else if decode.code != 0 {
        assessment
            .issues
            .push(format!("FFmpeg error (exit code {})", decode.code));
    } else if probe.code != 0 {
        assessment
            .issues
            .push(format!("Probe error (exit code {})", probe.code));
    }

    // Never leave the issue list empty on a failed classification
    if assessment.issues.is_empty() {
        assessment.issues.push("Playback errors detected".to_string());
    }

    assessment.recommendations.push("Attempt repair".to_string());
    assessment
}

/// Validate a caller-supplied path and confirm it points at a supported,
/// existing regular file.
pub fn validate_video_file(path: &Path) -> Result<PathBuf, AnalyzeError> {
    let path = file_organizer::validate_path(path)?;

    match path.extension() {
        Some(ext) if file_organizer::is_supported_extension(&ext.to_string_lossy()) => {}
        Some(ext) => {
            return Err(AnalyzeError::UnsupportedExtension(
                ext.to_string_lossy().to_string(),
            ));
        }
        None => {
            return Err(AnalyzeError::UnsupportedExtension(
                "(no extension)".to_string(),
            ));
        }
    }

    let metadata = std::fs::metadata(&path)?;
    if !metadata.is_file() {
        return Err(AnalyzeError::InvalidPath(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }

    Ok(path)
}

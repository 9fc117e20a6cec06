//! # Frame Extraction Module
//!
//! Salvages still frames from files no repair strategy could recover.
//! ffmpeg is invoked with the same error-tolerant flags as repair, sampling
//! frames at a configurable rate into numbered PNG files.
//!
//! Success means at least one frame landed on disk; an extraction that
//! produces nothing removes its empty directory so the output tree only
//! contains directories with actual salvage in them.

use crate::error::AnalyzeError;
use crate::process_runner::{ProcessRunner, RunOutcome};
use crate::tool_resolver::ToolPaths;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Accepted sampling range, frames per second
pub const MIN_FRAME_RATE: f64 = 0.1;
pub const MAX_FRAME_RATE: f64 = 60.0;

/// Result of one extraction run
#[derive(Debug)]
pub struct ExtractedFrames {
    pub dir: PathBuf,
    pub count: usize,
}

/// Extracts still frames from damaged video files
pub struct FrameExtractor {
    encoder: PathBuf,
    frame_rate: f64,
}

impl FrameExtractor {
    pub fn new(tools: &ToolPaths, frame_rate: f64) -> Result<Self, AnalyzeError> {
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&frame_rate) {
            return Err(AnalyzeError::Validation(format!(
                "Frame rate must be between {} and {} (got {})",
                MIN_FRAME_RATE, MAX_FRAME_RATE, frame_rate
            )));
        }
        Ok(Self {
            encoder: tools.encoder.clone(),
            frame_rate,
        })
    }

    /// Extract frames from `input` into `dest_dir`. Returns `None` when no
    /// frame could be salvaged.
    pub async fn extract(
        &self,
        runner: &ProcessRunner,
        input: &Path,
        dest_dir: &Path,
    ) -> Result<Option<ExtractedFrames>, AnalyzeError> {
        std::fs::create_dir_all(dest_dir)?;
        info!("Extracting frames from: {}", input.display());

        let pattern = dest_dir.join("frame_%06d.png");
        let args = vec![
            "-y".to_string(),
            "-err_detect".to_string(),
            "ignore_err".to_string(),
            "-fflags".to_string(),
            "+genpts+igndts+discardcorrupt".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("fps={}", self.frame_rate),
            "-q:v".to_string(),
            "1".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            pattern.to_string_lossy().to_string(),
        ];

        // Exit code is irrelevant here: a crash halfway through still
        // leaves salvaged frames worth keeping
        match runner.run(&self.encoder, &args).await {
            RunOutcome::Exited { .. } => {}
            RunOutcome::SpawnFailed { error } => {
                let _ = std::fs::remove_dir_all(dest_dir);
                return Err(AnalyzeError::SpawnFailure(error));
            }
            RunOutcome::Terminated => {
                let _ = std::fs::remove_dir_all(dest_dir);
                return Err(AnalyzeError::ProcessTerminated);
            }
        }

        let count = count_frames(dest_dir)?;
        if count == 0 {
            debug!("No frames salvaged from {}", input.display());
            std::fs::remove_dir_all(dest_dir)?;
            return Ok(None);
        }

        info!("Extracted {} frame(s) to {}", count, dest_dir.display());
        Ok(Some(ExtractedFrames {
            dir: dest_dir.to_path_buf(),
            count,
        }))
    }
}

fn count_frames(dir: &Path) -> Result<usize, AnalyzeError> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("frame_") && name.ends_with(".png") {
            count += 1;
        }
    }
    Ok(count)
}

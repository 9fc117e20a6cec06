//! # Repair Execution Module
//!
//! Drives ffmpeg repair attempts for one corrupted file: builds the output
//! path for each (file, strategy) pair, runs the planned command, and judges
//! the result.
//!
//! ## Output viability:
//! An attempt succeeds only when the output file exists on disk and is
//! larger than the minimum viable size. ffmpeg can exit zero after writing
//! a header-only file from a stream it could not actually decode; such
//! outputs are deleted immediately so they can never be mistaken for
//! repaired videos.
//!
//! ## Strategy loop:
//! Strategies run strictly in planner order, first success wins and the
//! remaining strategies are skipped. Every failed attempt is recorded with
//! its reason. A stop request is honored between strategies.

use crate::error::AnalyzeError;
use crate::process_runner::{ProcessRunner, RunOutcome};
use crate::stop::StopFlag;
use crate::strategy::{self, CorruptionLevel, OutputFormat, RepairStrategy};
use crate::tool_resolver::ToolPaths;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outputs below this size are header-only shells, never viable videos
const MIN_VIABLE_OUTPUT_BYTES: u64 = 10_000;

/// Subdirectory holding repair outputs until they are organized
const WORK_DIR_NAME: &str = "temp_repaired";

/// One failed repair attempt
#[derive(Debug, Clone, Serialize)]
pub struct FailedAttempt {
    pub strategy: RepairStrategy,
    pub reason: String,
}

/// Result of running the strategy loop for one file
#[derive(Debug, Serialize)]
pub struct RepairReport {
    /// Strategy that produced a viable output, with the output path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repaired: Option<(RepairStrategy, PathBuf)>,
    pub attempts: Vec<FailedAttempt>,
    /// True when the loop ended because of a stop or termination request
    pub interrupted: bool,
}

impl RepairReport {
    pub fn succeeded(&self) -> bool {
        self.repaired.is_some()
    }
}

/// Executes repair strategies against one input file at a time
pub struct RepairExecutor {
    encoder: PathBuf,
    work_dir: PathBuf,
    format: OutputFormat,
}

impl RepairExecutor {
    pub fn new(tools: &ToolPaths, output_dir: &Path, format: OutputFormat) -> Self {
        Self {
            encoder: tools.encoder.clone(),
            work_dir: output_dir.join(WORK_DIR_NAME),
            format,
        }
    }

    /// Output path for one (input, strategy) pair
    pub fn output_path(&self, input: &Path, strategy: RepairStrategy) -> PathBuf {
        let base = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        self.work_dir.join(format!(
            "{}_{}{}",
            base,
            strategy.as_str(),
            self.format.extension()
        ))
    }

    /// Try strategies in planner order until one yields a viable output.
    pub async fn attempt_all(
        &self,
        runner: &ProcessRunner,
        input: &Path,
        level: CorruptionLevel,
        stop: &StopFlag,
    ) -> RepairReport {
        let mut report = RepairReport {
            repaired: None,
            attempts: Vec::new(),
            interrupted: false,
        };

        for strategy in strategy::strategies_for(level) {
            if stop.is_set() {
                report.interrupted = true;
                break;
            }

            info!(
                "Attempting {} repair: {}",
                strategy,
                input.display()
            );
            match self.attempt(runner, input, strategy).await {
                AttemptOutcome::Repaired(output) => {
                    info!("Repair succeeded with {}: {}", strategy, output.display());
                    report.repaired = Some((strategy, output));
                    break;
                }
                AttemptOutcome::Failed(reason) => {
                    debug!("Strategy {} failed: {}", strategy, reason);
                    report.attempts.push(FailedAttempt { strategy, reason });
                }
                AttemptOutcome::Terminated => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        report
    }

    /// Run one strategy and judge the output.
    async fn attempt(
        &self,
        runner: &ProcessRunner,
        input: &Path,
        strategy: RepairStrategy,
    ) -> AttemptOutcome {
        if let Err(e) = std::fs::create_dir_all(&self.work_dir) {
            return AttemptOutcome::Failed(format!(
                "Cannot create work directory {}: {}",
                self.work_dir.display(),
                e
            ));
        }

        let output = self.output_path(input, strategy);
        let params = strategy::encoding_params_for(self.format);
        let args = strategy::command_for(strategy, &params, input, &output);

        match runner.run(&self.encoder, &args).await {
            RunOutcome::Exited { code, stderr, .. } => {
                match judge_output(&output) {
                    Ok(()) => AttemptOutcome::Repaired(output),
                    Err(reason) => {
                        if code != 0 {
                            let line = stderr.lines().last().unwrap_or("").trim();
                            AttemptOutcome::Failed(format!(
                                "ffmpeg exited with code {}: {}",
                                code, line
                            ))
                        } else {
                            AttemptOutcome::Failed(reason)
                        }
                    }
                }
            }
            RunOutcome::SpawnFailed { error } => {
                warn!("Repair spawn failed: {}", error);
                AttemptOutcome::Failed(format!("Failed to start ffmpeg: {}", error))
            }
            RunOutcome::Terminated => {
                // Partial output from a killed encode is never viable
                let _ = std::fs::remove_file(&output);
                AttemptOutcome::Terminated
            }
        }
    }
}

enum AttemptOutcome {
    Repaired(PathBuf),
    Failed(String),
    Terminated,
}

/// Accept the output only if it exists and clears the viability threshold;
/// delete anything smaller.
fn judge_output(output: &Path) -> Result<(), String> {
    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > MIN_VIABLE_OUTPUT_BYTES => Ok(()),
        Ok(meta) => {
            let _ = std::fs::remove_file(output);
            Err(AnalyzeError::OutputTooSmall(meta.len()).to_string())
        }
        Err(_) => Err("No output file produced".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_runner::ProcessRegistry;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_encoder(dir: &Path, script: &str) -> ToolPaths {
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ToolPaths {
            prober: dir.join("ffprobe"),
            encoder: path,
        }
    }

    fn input_file(dir: &Path) -> PathBuf {
        let path = dir.join("clip.mp4");
        std::fs::write(&path, vec![0u8; 128]).unwrap();
        path
    }

    // The last argument of every repair command is the output path
    const WRITE_VIABLE: &str = "for last; do :; done; head -c 20000 /dev/zero > \"$last\"";
    const WRITE_TINY: &str = "for last; do :; done; head -c 100 /dev/zero > \"$last\"";

    #[tokio::test]
    async fn test_viable_output_succeeds_first_strategy() {
        let dir = TempDir::new().unwrap();
        let tools = fake_encoder(dir.path(), WRITE_VIABLE);
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::H264Mp4);
        let runner = ProcessRunner::new(ProcessRegistry::new());

        let report = executor
            .attempt_all(
                &runner,
                &input_file(dir.path()),
                CorruptionLevel::Moderate,
                &StopFlag::new(),
            )
            .await;

        let (strategy, output) = report.repaired.expect("repair should succeed");
        assert_eq!(strategy, RepairStrategy::StreamRemux);
        assert!(report.attempts.is_empty());
        assert!(output.ends_with("temp_repaired/clip_stream-remux.mp4"));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_tiny_output_deleted_and_recorded() {
        let dir = TempDir::new().unwrap();
        let tools = fake_encoder(dir.path(), WRITE_TINY);
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::H264Mp4);
        let runner = ProcessRunner::new(ProcessRegistry::new());

        let report = executor
            .attempt_all(
                &runner,
                &input_file(dir.path()),
                CorruptionLevel::Minor,
                &StopFlag::new(),
            )
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.attempts.len(), 1);
        assert!(report.attempts[0].reason.contains("too small"));
        assert!(report.attempts[0].reason.contains("100 bytes"));
        // The shell output must not linger as a fake repaired file
        assert!(!executor
            .output_path(&dir.path().join("clip.mp4"), RepairStrategy::ContainerRepair)
            .exists());
    }

    #[tokio::test]
    async fn test_second_strategy_wins_after_first_fails() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("first_attempt_done");
        let script = format!(
            "for last; do :; done\n\
             if [ -f \"{0}\" ]; then head -c 20000 /dev/zero > \"$last\"; \
             else touch \"{0}\"; exit 1; fi",
            marker.display()
        );
        let tools = fake_encoder(dir.path(), &script);
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::H264Mp4);
        let runner = ProcessRunner::new(ProcessRegistry::new());

        let report = executor
            .attempt_all(
                &runner,
                &input_file(dir.path()),
                CorruptionLevel::Moderate,
                &StopFlag::new(),
            )
            .await;

        let (strategy, _) = report.repaired.expect("second strategy should succeed");
        assert_eq!(strategy, RepairStrategy::ExtractPlayable);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].strategy, RepairStrategy::StreamRemux);
    }

    #[tokio::test]
    async fn test_all_strategies_exhausted() {
        let dir = TempDir::new().unwrap();
        let tools = fake_encoder(dir.path(), "exit 1");
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::H264Mp4);
        let runner = ProcessRunner::new(ProcessRegistry::new());

        let report = executor
            .attempt_all(
                &runner,
                &input_file(dir.path()),
                CorruptionLevel::Severe,
                &StopFlag::new(),
            )
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.attempts.len(), 4);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_stop_flag_skips_remaining_strategies() {
        let dir = TempDir::new().unwrap();
        let tools = fake_encoder(dir.path(), "exit 1");
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::H264Mp4);
        let runner = ProcessRunner::new(ProcessRegistry::new());

        let stop = StopFlag::new();
        stop.set();
        let report = executor
            .attempt_all(&runner, &input_file(dir.path()), CorruptionLevel::Severe, &stop)
            .await;

        assert!(report.interrupted);
        assert!(report.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_prores_output_uses_mov_extension() {
        let dir = TempDir::new().unwrap();
        let tools = fake_encoder(dir.path(), WRITE_VIABLE);
        let executor = RepairExecutor::new(&tools, dir.path(), OutputFormat::ProResMov);

        let output = executor.output_path(Path::new("/v/clip.mp4"), RepairStrategy::DeepRepair);
        assert!(output.ends_with("temp_repaired/clip_deep-repair.mov"));
    }
}

//! # Batch Analysis Orchestrator
//!
//! Drives the full pipeline for a list of files: classification, optional
//! repair, file organization, and last-resort frame salvage.
//!
//! ## Processing model:
//! Files are processed strictly one at a time, in input order, with a short
//! pause between files so a burst of ffmpeg invocations never saturates the
//! machine. Results come back in the same order the files went in.
//!
//! ## Failure containment:
//! A file that fails classification or repair produces a failed outcome and
//! the batch moves on. Only two conditions abort the batch before any file
//! is processed: the external tools cannot be located, or the output
//! directory cannot be proven writable.
//!
//! ## Outcomes per file:
//! - Healthy: recorded, left in place
//! - Repaired: output moved to `fixed/`, original moved to `corrupt/`
//! - Unrepairable after all strategies: frames salvaged (when enabled),
//!   original moved to `corrupt/`
//!
//! ## Stopping:
//! The cooperative stop flag is honored between files and between repair
//! strategies; already-running work finishes (or is force-terminated via
//! the process registry by the caller).

use crate::classifier::{CorruptionAssessment, FileClassifier};
use crate::config::BatchOptions;
use crate::error::AnalyzeError;
use crate::file_organizer::{Category, FileOrganizer};
use crate::frames::FrameExtractor;
use crate::process_runner::{ProcessRegistry, ProcessRunner};
use crate::repair::{RepairExecutor, RepairReport};
use crate::stop::StopFlag;
use crate::strategy::{CorruptionLevel, RepairStrategy};
use crate::tool_resolver::ToolPaths;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Pause between consecutive files
const INTER_FILE_PAUSE: Duration = Duration::from_millis(100);

/// Progress notifications emitted while the batch runs. Every event
/// carries the file and its position in the batch so a consumer never has
/// to re-query state; `Completed` and `Repaired` carry the result itself.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Analyzing {
        file: PathBuf,
        index: usize,
        total: usize,
    },
    Completed {
        file: PathBuf,
        index: usize,
        total: usize,
        assessment: CorruptionAssessment,
    },
    Repairing {
        file: PathBuf,
        index: usize,
        total: usize,
    },
    Repaired {
        file: PathBuf,
        index: usize,
        total: usize,
        strategy: RepairStrategy,
        output: PathBuf,
    },
    ExtractingFrames {
        file: PathBuf,
        index: usize,
        total: usize,
    },
    FramesExtracted {
        file: PathBuf,
        index: usize,
        total: usize,
        count: usize,
    },
}

/// What finally happened to a file, recorded on its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// Healthy, nothing to do
    LeftInPlace,
    /// A strategy produced a viable output
    Repaired,
    /// Every strategy failed
    Unrepairable,
}

/// Everything that happened to one file
#[derive(Debug, Serialize)]
pub struct BatchItemOutcome {
    pub assessment: CorruptionAssessment,
    /// Final disposition; absent when nothing was decided (analysis-only
    /// corrupted files, failed assessments, interrupted repairs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<FileAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairReport>,
    /// Where the repaired output landed, when repair succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_path: Option<PathBuf>,
    /// Where the original landed, when it was moved out of the way
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrupt_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_count: Option<usize>,
    /// Non-fatal organization problems for this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organize_error: Option<String>,
}

impl BatchItemOutcome {
    fn new(assessment: CorruptionAssessment) -> Self {
        Self {
            assessment,
            action: None,
            repair: None,
            fixed_path: None,
            corrupt_path: None,
            frames_dir: None,
            frames_count: None,
            organize_error: None,
        }
    }
}

/// Result of a whole batch run
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub outcomes: Vec<BatchItemOutcome>,
    /// True when a stop request ended the batch before all files ran
    pub stopped: bool,
}

impl BatchSummary {
    pub fn healthy_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.assessment.success && o.assessment.corruption_level == CorruptionLevel::None)
            .count()
    }

    pub fn repaired_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.fixed_path.is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.healthy_count() - self.repaired_count()
    }
}

/// Orchestrates analysis and repair for a batch of files
pub struct BatchAnalyzer {
    options: BatchOptions,
    tools: ToolPaths,
    runner: ProcessRunner,
    stop: StopFlag,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl BatchAnalyzer {
    pub fn new(
        options: BatchOptions,
        tools: ToolPaths,
        registry: ProcessRegistry,
        stop: StopFlag,
    ) -> Self {
        Self {
            options,
            tools,
            runner: ProcessRunner::new(registry),
            stop,
            progress: None,
        }
    }

    /// Attach a progress channel. Events are best-effort; a dropped
    /// receiver never stalls the batch.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref sender) = self.progress {
            let _ = sender.send(event);
        }
    }

    /// Process every file in order. Fails fast only on batch-fatal setup
    /// problems; per-file failures are captured in the outcomes.
    pub async fn run(&self, files: &[PathBuf]) -> Result<BatchSummary, AnalyzeError> {
        self.options.validate()?;

        let organizer = match (self.options.repair, &self.options.output_dir) {
            (true, Some(dir)) => Some(FileOrganizer::new(dir)?),
            _ => None,
        };
        let executor = organizer.as_ref().map(|org| {
            RepairExecutor::new(&self.tools, org.output_dir(), self.options.output_format)
        });
        let extractor = if self.options.extract_frames_on_failure {
            Some(FrameExtractor::new(&self.tools, self.options.failure_frame_rate)?)
        } else {
            None
        };

        let classifier = FileClassifier::new(self.tools.clone());
        let total = files.len();
        let mut summary = BatchSummary {
            outcomes: Vec::with_capacity(total),
            stopped: false,
        };

        for (index, file) in files.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(INTER_FILE_PAUSE).await;
            }
            if self.stop.is_set() {
                info!("Stop requested, {} file(s) left unprocessed", total - index);
                summary.stopped = true;
                break;
            }

            self.emit(ProgressEvent::Analyzing {
                file: file.clone(),
                index,
                total,
            });

            let assessment = classifier.classify(&self.runner, file).await;
            self.emit(ProgressEvent::Completed {
                file: file.clone(),
                index,
                total,
                assessment: assessment.clone(),
            });

            let mut outcome = BatchItemOutcome::new(assessment);
            if outcome.assessment.success
                && outcome.assessment.corruption_level == CorruptionLevel::None
            {
                outcome.action = Some(FileAction::LeftInPlace);
            }
            if outcome.assessment.repair_feasible {
                if let (Some(organizer), Some(executor)) = (&organizer, &executor) {
                    self.repair_file(&mut outcome, index, total, organizer, executor, extractor.as_ref())
                        .await;
                    if outcome
                        .repair
                        .as_ref()
                        .map(|r| r.interrupted)
                        .unwrap_or(false)
                    {
                        summary.outcomes.push(outcome);
                        summary.stopped = true;
                        break;
                    }
                }
            }
            summary.outcomes.push(outcome);
        }

        info!(
            "Batch finished: {} healthy, {} repaired, {} failed{}",
            summary.healthy_count(),
            summary.repaired_count(),
            summary.failed_count(),
            if summary.stopped { " (stopped early)" } else { "" }
        );
        Ok(summary)
    }

    /// Run the strategy loop for one corrupted file and organize the
    /// results. Every failure here is per-file, never batch-fatal.
    async fn repair_file(
        &self,
        outcome: &mut BatchItemOutcome,
        index: usize,
        total: usize,
        organizer: &FileOrganizer,
        executor: &RepairExecutor,
        extractor: Option<&FrameExtractor>,
    ) {
        let file = outcome.assessment.file.clone();
        self.emit(ProgressEvent::Repairing {
            file: file.clone(),
            index,
            total,
        });

        let report = executor
            .attempt_all(
                &self.runner,
                &file,
                outcome.assessment.corruption_level,
                &self.stop,
            )
            .await;

        match &report.repaired {
            Some((strategy, output)) => {
                outcome.action = Some(FileAction::Repaired);
                self.emit(ProgressEvent::Repaired {
                    file: file.clone(),
                    index,
                    total,
                    strategy: *strategy,
                    output: output.clone(),
                });
                match organizer.move_to_category(output, Category::Fixed) {
                    Ok(dest) => outcome.fixed_path = Some(dest),
                    Err(e) => outcome.organize_error = Some(e.user_message()),
                }
            }
            None if !report.interrupted => {
                warn!("All repair strategies failed: {}", file.display());
                outcome.action = Some(FileAction::Unrepairable);
                if let Some(extractor) = extractor {
                    self.emit(ProgressEvent::ExtractingFrames {
                        file: file.clone(),
                        index,
                        total,
                    });
                    match extractor
                        .extract(&self.runner, &file, &organizer.frames_dir(&file))
                        .await
                    {
                        Ok(Some(frames)) => {
                            self.emit(ProgressEvent::FramesExtracted {
                                file: file.clone(),
                                index,
                                total,
                                count: frames.count,
                            });
                            outcome.frames_dir = Some(frames.dir);
                            outcome.frames_count = Some(frames.count);
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Frame extraction failed: {}", e.user_message()),
                    }
                }
            }
            None => {}
        }

        // The original is corrupted either way; move it out of the source
        // tree unless the run was interrupted mid-file
        if !report.interrupted {
            match organizer.move_to_category(&file, Category::Corrupt) {
                Ok(dest) => outcome.corrupt_path = Some(dest),
                Err(e) => {
                    if outcome.organize_error.is_none() {
                        outcome.organize_error = Some(e.user_message());
                    }
                }
            }
        }

        outcome.repair = Some(report);
    }
}

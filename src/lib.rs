//! # vidmend
//!
//! Batch analysis and repair of corrupted video files, driving FFmpeg and
//! FFprobe as external tools.
//!
//! ## Pipeline:
//! 1. Discover candidate videos (or take explicit file paths)
//! 2. Classify each file via a probe pass and a decode pass
//! 3. Plan repair strategies from the corruption severity
//! 4. Attempt repairs in order, keeping the first viable output
//! 5. Organize results into `fixed/` and `corrupt/` directories
//! 6. Salvage still frames from files nothing could repair
//!
//! ## Module layout:
//! - `analyzer`: batch orchestration, progress events, per-file outcomes
//! - `classifier`: two-pass validation and the corruption decision table
//! - `strategy`: pure planning of strategies, formats and ffmpeg commands
//! - `repair`: strategy execution with output viability checks
//! - `frames`: last-resort frame extraction
//! - `file_organizer`: discovery, path validation, category moves
//! - `tool_resolver`: locating bundled or system FFmpeg/FFprobe
//! - `process_runner`: process lifecycle with forced-termination support
//! - `stop`: cooperative stop flag
//! - `config`: batch options
//! - `progress`: terminal progress display
//! - `report`: JSON report output
//! - `error`: error types

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod file_organizer;
pub mod frames;
pub mod process_runner;
pub mod progress;
pub mod repair;
pub mod report;
pub mod stop;
pub mod strategy;
pub mod tool_resolver;

pub use analyzer::{BatchAnalyzer, BatchItemOutcome, BatchSummary, FileAction, ProgressEvent};
pub use classifier::{CorruptionAssessment, FileClassifier};
pub use config::BatchOptions;
pub use error::AnalyzeError;
pub use file_organizer::{find_video_files, FileOrganizer};
pub use process_runner::{ProcessRegistry, ProcessRunner, RunOutcome};
pub use stop::StopFlag;
pub use strategy::{CorruptionLevel, OutputFormat, RepairStrategy};
pub use tool_resolver::{ToolPaths, ToolResolver};

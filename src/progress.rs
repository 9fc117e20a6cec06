//! # Progress Display Module
//!
//! Terminal feedback while a batch runs, built on `indicatif`.
//!
//! ## Responsibilities:
//! - One progress bar over the whole batch, advanced per file
//! - Per-file status messages driven by `ProgressEvent`s
//! - Cumulative batch statistics for the final summary line
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [=================>----------------------] 4/9 (44%) Repairing clip.mp4
//! ```

use crate::analyzer::ProgressEvent;
use crate::strategy::CorruptionLevel;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages the batch progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Render one pipeline event onto the bar
    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Analyzing { file, .. } => {
                self.bar.set_message(format!("Analyzing {}", file_name(file)));
            }
            ProgressEvent::Completed { file, assessment, .. } => {
                self.bar.inc(1);
                let status = match assessment.corruption_level {
                    CorruptionLevel::None => "✅ healthy",
                    CorruptionLevel::Minor => "⚠️ minor corruption",
                    CorruptionLevel::Moderate => "⚠️ moderate corruption",
                    CorruptionLevel::Severe => "❌ severe corruption",
                };
                self.bar
                    .set_message(format!("{}: {}", file_name(file), status));
            }
            ProgressEvent::Repairing { file, .. } => {
                self.bar.set_message(format!("Repairing {}", file_name(file)));
            }
            ProgressEvent::Repaired { file, strategy, .. } => {
                self.bar
                    .set_message(format!("✅ {} repaired ({})", file_name(file), strategy));
            }
            ProgressEvent::ExtractingFrames { file, .. } => {
                self.bar
                    .set_message(format!("Extracting frames from {}", file_name(file)));
            }
            ProgressEvent::FramesExtracted { file, count, .. } => {
                self.bar
                    .set_message(format!("{}: {} frame(s) salvaged", file_name(file), count));
            }
        }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Cumulative statistics for the final summary
#[derive(Debug, Default)]
pub struct BatchStats {
    pub files_processed: usize,
    pub healthy: usize,
    pub repaired: usize,
    pub unrepaired: usize,
    pub frames_salvaged: usize,
    pub errors: usize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_healthy(&mut self) {
        self.files_processed += 1;
        self.healthy += 1;
    }

    pub fn add_repaired(&mut self) {
        self.files_processed += 1;
        self.repaired += 1;
    }

    pub fn add_unrepaired(&mut self, frames: usize) {
        self.files_processed += 1;
        self.unrepaired += 1;
        self.frames_salvaged += frames;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Processed: {} files | Healthy: {} | Repaired: {} | Unrepaired: {} | Errors: {}",
            self.files_processed, self.healthy, self.repaired, self.unrepaired, self.errors
        );
        if self.frames_salvaged > 0 {
            summary.push_str(&format!(" | Frames salvaged: {}", self.frames_salvaged));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = BatchStats::new();
        stats.add_healthy();
        stats.add_repaired();
        stats.add_unrepaired(12);
        stats.add_error();

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.frames_salvaged, 12);
        let summary = stats.format_summary();
        assert!(summary.contains("Repaired: 1"));
        assert!(summary.contains("Frames salvaged: 12"));
    }

    #[test]
    fn test_summary_hides_zero_frames() {
        let mut stats = BatchStats::new();
        stats.add_healthy();
        assert!(!stats.format_summary().contains("Frames salvaged"));
    }
}

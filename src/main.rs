//! # vidmend - Main Entry Point
//!
//! ## Responsibilities:
//! - Command line parsing with `clap`
//! - Logging setup with `tracing`
//! - Input expansion (directories are scanned, files taken as-is)
//! - Wiring the stop flag and process registry to Ctrl-C
//! - Running the batch and rendering progress + final summary
//!
//! ## Example usage:
//! ```bash
//! vidmend /path/to/videos --repair --output /path/to/sorted --extract-frames
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use vidmend::progress::{BatchStats, ProgressManager};
use vidmend::report::BatchReport;
use vidmend::file_organizer::canonicalize_input;
use vidmend::{
    find_video_files, BatchAnalyzer, BatchOptions, CorruptionLevel, ProcessRegistry, ProgressEvent,
    StopFlag, ToolResolver,
};

#[derive(Parser)]
#[command(name = "vidmend")]
#[command(about = "Analyze and repair corrupted video files in batch")]
struct Args {
    /// Video files or directories to analyze
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Attempt repair of corrupted files (analysis-only without this)
    #[arg(short, long)]
    repair: bool,

    /// Output directory for organized results (required with --repair)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format for repaired files: h264-mp4, hevc-mp4 or prores-mov
    #[arg(short, long, default_value = "h264-mp4")]
    format: String,

    /// Salvage still frames from files no strategy can repair
    #[arg(long)]
    extract_frames: bool,

    /// Sampling rate for frame salvage, frames per second (0.1-60)
    #[arg(long, default_value = "1.0")]
    frame_rate: f64,

    /// Write a JSON report of all outcomes to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = BatchOptions {
        repair: args.repair,
        output_dir: args.output.clone(),
        output_format: args.format.parse().map_err(anyhow::Error::msg)?,
        extract_frames_on_failure: args.extract_frames,
        failure_frame_rate: args.frame_rate,
    };
    options.validate().map_err(anyhow::Error::msg)?;

    // Resolve inputs to canonical absolute paths, then expand directories
    // into their video files and keep explicit files as-is
    let mut files = Vec::new();
    for input in &args.inputs {
        let input =
            canonicalize_input(input).map_err(|e| anyhow::anyhow!(e.user_message()))?;
        if input.is_dir() {
            files.extend(find_video_files(&input)?);
        } else {
            files.push(input);
        }
    }
    if files.is_empty() {
        return Err(anyhow::anyhow!("No video files found in the given inputs"));
    }
    info!("Found {} video file(s) to process", files.len());

    let tools = ToolResolver::new()
        .locate()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let registry = ProcessRegistry::new();
    let stop = StopFlag::new();

    // First Ctrl-C requests a graceful stop and kills in-flight processes;
    // partially written repair outputs are discarded by the runner
    {
        let registry = registry.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stop requested, finishing current file bookkeeping");
                stop.set();
                registry.terminate_all();
            }
        });
    }

    let bar = ProgressManager::new(files.len() as u64);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let display = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                bar.handle(&event);
            }
        })
    };

    let analyzer = BatchAnalyzer::new(options, tools, registry, stop).with_progress(tx);
    let summary = analyzer
        .run(&files)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    // Dropping the analyzer closes the event channel so the display
    // task can drain and exit
    drop(analyzer);
    display.await?;

    let mut stats = BatchStats::new();
    for outcome in &summary.outcomes {
        if !outcome.assessment.success {
            stats.add_error();
        } else if outcome.assessment.corruption_level == CorruptionLevel::None {
            stats.add_healthy();
        } else if outcome.fixed_path.is_some() {
            stats.add_repaired();
        } else {
            stats.add_unrepaired(outcome.frames_count.unwrap_or(0));
        }
    }
    bar.finish(&stats.format_summary());

    if let Some(ref report_path) = args.report {
        BatchReport::from_summary(&summary)
            .save(report_path)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    }

    if summary.stopped {
        warn!("Batch stopped before all files were processed");
    }

    Ok(())
}

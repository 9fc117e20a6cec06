//! # JSON Report Module
//!
//! Structured machine-readable report of a batch run, for driving other
//! tooling off the results. The report mirrors the in-memory outcomes:
//! per-file assessment, repair attempts, and where everything landed.

use crate::analyzer::BatchSummary;
use crate::error::AnalyzeError;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Top-level report document
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub totals: ReportTotals,
    pub stopped: bool,
    pub files: &'a [crate::analyzer::BatchItemOutcome],
}

#[derive(Debug, Serialize)]
pub struct ReportTotals {
    pub processed: usize,
    pub healthy: usize,
    pub repaired: usize,
    pub failed: usize,
}

impl<'a> BatchReport<'a> {
    pub fn from_summary(summary: &'a BatchSummary) -> Self {
        Self {
            tool: "vidmend",
            version: env!("CARGO_PKG_VERSION"),
            totals: ReportTotals {
                processed: summary.outcomes.len(),
                healthy: summary.healthy_count(),
                repaired: summary.repaired_count(),
                failed: summary.failed_count(),
            },
            stopped: summary.stopped,
            files: &summary.outcomes,
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), AnalyzeError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalyzeError::Validation(format!("Cannot serialize report: {}", e)))?;
        std::fs::write(path, json)?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

//! # Tool Path Resolver
//!
//! This module handles finding the two required external tools (ffprobe for
//! probing, ffmpeg for decoding/encoding) in different environments:
//! - Bundled with the application
//! - System-installed tools
//!
//! ## Search order:
//! 1. Platform-specific bundled-binary directory (`VIDMEND_TOOLS_DIR`
//!    override, then a `resources/binaries/<platform>` directory next to
//!    the executable)
//! 2. An ordered list of common system installation paths
//! 3. Fail with `ToolNotFound`, naming the expected bundled directory
//!
//! ## Verification:
//! Every candidate is invoked with `-version` and accepted only when the
//! output contains the expected marker string ("ffmpeg version" /
//! "ffprobe version"). File existence alone is never trusted; a zero-byte
//! or non-executable file must not be accepted.

use crate::error::AnalyzeError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Resolved paths to the two required external tools
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// ffprobe: structured metadata + error reporting
    pub prober: PathBuf,
    /// ffmpeg: decode validation, repair encoding, frame extraction
    pub encoder: PathBuf,
}

/// Locates ffprobe and ffmpeg across deployment environments
pub struct ToolResolver {
    /// Base directory where tools are bundled, if one was detected
    tools_dir: Option<PathBuf>,
}

impl ToolResolver {
    pub fn new() -> Self {
        Self {
            tools_dir: detect_bundled_tools_dir(),
        }
    }

    /// Build a resolver pinned to a specific bundled-tools directory.
    pub fn with_tools_dir(tools_dir: PathBuf) -> Self {
        Self {
            tools_dir: Some(tools_dir),
        }
    }

    /// Resolve both tools, or fail with an actionable `ToolNotFound`.
    pub async fn locate(&self) -> Result<ToolPaths, AnalyzeError> {
        // 1. Bundled binaries
        if let Some(ref tools_dir) = self.tools_dir {
            let prober = tools_dir.join(binary_name("ffprobe"));
            let encoder = tools_dir.join(binary_name("ffmpeg"));

            if verify_tool(&encoder, "ffmpeg version").await
                && verify_tool(&prober, "ffprobe version").await
            {
                info!("Using bundled FFmpeg at: {}", encoder.display());
                return Ok(ToolPaths { prober, encoder });
            }

            warn!(
                "Bundled binaries in {} are missing or not functional",
                tools_dir.display()
            );
        }

        // 2. System installation
        debug!("Bundled FFmpeg not available, checking system installation");
        for (encoder, prober) in system_candidates() {
            if verify_tool(&encoder, "ffmpeg version").await
                && verify_tool(&prober, "ffprobe version").await
            {
                info!("Found system FFmpeg: {}", encoder.display());
                return Ok(ToolPaths { prober, encoder });
            }
        }

        // 3. Neither found
        Err(AnalyzeError::ToolNotFound(format!(
            "FFmpeg not found. Please either install FFmpeg system-wide, \
             or place FFmpeg binaries in resources/binaries/{}/",
            platform_dir()
        )))
    }
}

impl Default for ToolResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Invoke a candidate with a version query and check the expected marker.
async fn verify_tool(path: &Path, marker: &str) -> bool {
    let output = Command::new(path).arg("-version").output().await;

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let ok = output.status.success() && stdout.contains(marker);
            if !ok {
                debug!("Candidate rejected: {}", path.display());
            }
            ok
        }
        Err(e) => {
            debug!("Candidate not runnable: {} ({})", path.display(), e);
            false
        }
    }
}

/// Platform directory name used inside the bundled resources tree
fn platform_dir() -> &'static str {
    if cfg!(target_os = "windows") {
        "win32-x64"
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            "darwin-arm64"
        } else {
            "darwin-x64"
        }
    } else {
        "linux-x64"
    }
}

fn binary_name(tool: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

/// Detect the bundled tools directory, if any
fn detect_bundled_tools_dir() -> Option<PathBuf> {
    // Direct override
    if let Ok(dir) = env::var("VIDMEND_TOOLS_DIR") {
        let path = PathBuf::from(dir);
        debug!("Checking VIDMEND_TOOLS_DIR: {}", path.display());
        if path.exists() {
            return Some(path);
        }
    }

    // Executable-relative resources tree
    if let Ok(exe_path) = env::current_exe() {
        if let Some(app_dir) = exe_path.parent() {
            let path = app_dir
                .join("resources")
                .join("binaries")
                .join(platform_dir());
            debug!("Checking bundled path: {}", path.display());
            if path.exists() {
                return Some(path);
            }
        }
    }

    debug!("No bundled tools directory found");
    None
}

/// Ordered (ffmpeg, ffprobe) candidate pairs for common system locations
fn system_candidates() -> Vec<(PathBuf, PathBuf)> {
    let pairs: Vec<(&str, &str)> = if cfg!(target_os = "windows") {
        vec![
            ("ffmpeg.exe", "ffprobe.exe"),
            ("C:\\ffmpeg\\bin\\ffmpeg.exe", "C:\\ffmpeg\\bin\\ffprobe.exe"),
            (
                "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
                "C:\\Program Files\\ffmpeg\\bin\\ffprobe.exe",
            ),
            (
                "C:\\Program Files (x86)\\ffmpeg\\bin\\ffmpeg.exe",
                "C:\\Program Files (x86)\\ffmpeg\\bin\\ffprobe.exe",
            ),
        ]
    } else {
        vec![
            ("/usr/local/bin/ffmpeg", "/usr/local/bin/ffprobe"),
            ("/opt/homebrew/bin/ffmpeg", "/opt/homebrew/bin/ffprobe"),
            ("/usr/bin/ffmpeg", "/usr/bin/ffprobe"),
            (
                "/usr/local/ffmpeg/bin/ffmpeg",
                "/usr/local/ffmpeg/bin/ffprobe",
            ),
            ("/snap/bin/ffmpeg", "/snap/bin/ffprobe"),
            (
                "/usr/local/opt/ffmpeg/bin/ffmpeg",
                "/usr/local/opt/ffmpeg/bin/ffprobe",
            ),
            ("ffmpeg", "ffprobe"),
        ]
    };

    pairs
        .into_iter()
        .map(|(f, p)| (PathBuf::from(f), PathBuf::from(p)))
        .collect()
}

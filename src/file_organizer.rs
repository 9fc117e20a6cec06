//! # File Organization Module
//!
//! This module handles all filesystem operations around the pipeline:
//! discovery of candidate videos, path validation, output directory
//! preparation, and sorting processed files into category directories.
//!
//! ## Responsibilities:
//! - Recursive discovery of supported video files (bounded depth, hidden
//!   entries skipped)
//! - Path validation before anything touches the filesystem
//! - Write-test verification of the output directory before the batch starts
//! - Copy-verify-delete moves into `corrupt/` and `fixed/` category
//!   directories (safe across filesystem boundaries)
//!
//! ## Move safety invariant:
//! A source file is deleted only after the copied bytes at the destination
//! have been re-read from disk and their size verified. A failed or
//! unverified copy leaves the source untouched.

use crate::error::AnalyzeError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File extensions accepted for analysis, lowercase without the dot
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "flv", "webm", "wmv", "mpg", "mpeg",
];

/// Maximum directory depth for recursive discovery
const MAX_SCAN_DEPTH: usize = 10;

/// Maximum accepted path length in bytes
const MAX_PATH_LEN: usize = 4096;

/// Destination categories for processed files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Originals that remain damaged (unrepairable, or kept after repair)
    Corrupt,
    /// Successfully repaired outputs
    Fixed,
}

impl Category {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Corrupt => "corrupt",
            Category::Fixed => "fixed",
        }
    }
}

pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Reject paths that could escape or break the pipeline before any
/// filesystem call is made with them.
pub fn validate_path(path: &Path) -> Result<PathBuf, AnalyzeError> {
    let text = path.to_string_lossy();

    if text.len() > MAX_PATH_LEN {
        return Err(AnalyzeError::InvalidPath(format!(
            "Path exceeds {} characters",
            MAX_PATH_LEN
        )));
    }
    if text.contains('\0') {
        return Err(AnalyzeError::InvalidPath(
            "Path contains a null byte".to_string(),
        ));
    }
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(AnalyzeError::InvalidPath(format!(
            "Path contains parent-directory traversal: {}",
            path.display()
        )));
    }
    if !path.is_absolute() {
        return Err(AnalyzeError::InvalidPath(format!(
            "Path must be absolute: {}",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Resolve a user-supplied input to an absolute, symlink-free path that
/// passes `validate_path`. Relative paths and `..` segments from the
/// command line are legitimate; they just have to be resolved before the
/// pipeline sees them.
pub fn canonicalize_input(path: &Path) -> Result<PathBuf, AnalyzeError> {
    let canonical = std::fs::canonicalize(path).map_err(|e| {
        AnalyzeError::InvalidPath(format!(
            "{}: {}",
            path.display(),
            crate::error::user_friendly_io(&e)
        ))
    })?;
    validate_path(&canonical)
}

/// Recursively discover supported video files under `root`, sorted for a
/// stable processing order. Hidden files and directories are skipped.
pub fn find_video_files(root: &Path) -> Result<Vec<PathBuf>, AnalyzeError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .max_depth(MAX_SCAN_DEPTH)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = entry.path().extension() {
            if is_supported_extension(&ext.to_string_lossy()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    debug!("Discovered {} video file(s) under {}", files.len(), root.display());
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Organizes processed files into category directories under one output root
pub struct FileOrganizer {
    output_dir: PathBuf,
}

impl FileOrganizer {
    /// Create an organizer after proving the output directory is usable.
    /// An unwritable or uncreatable directory is batch-fatal.
    pub fn new(output_dir: &Path) -> Result<Self, AnalyzeError> {
        ensure_writable_dir(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory for extracted frames of one source file
    pub fn frames_dir(&self, source: &Path) -> PathBuf {
        let base = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.output_dir.join("extracted_frames").join(base)
    }

    /// Move a file into a category directory via copy, verify, delete.
    /// Returns the destination path.
    pub fn move_to_category(
        &self,
        source: &Path,
        category: Category,
    ) -> Result<PathBuf, AnalyzeError> {
        let dir = self.output_dir.join(category.dir_name());
        std::fs::create_dir_all(&dir)?;

        let name = source.file_name().ok_or_else(|| {
            AnalyzeError::OrganizeFailure(format!("Source has no file name: {}", source.display()))
        })?;
        let dest = dir.join(name);

        let source_len = std::fs::metadata(source)?.len();
        std::fs::copy(source, &dest)?;
        verify_then_delete(source, &dest, source_len)?;

        debug!("Moved {} -> {}", source.display(), dest.display());
        Ok(dest)
    }
}

/// Delete the source only after the destination bytes have been re-read
/// from disk and their size verified. On any mismatch the bad copy is
/// removed and the source stays where it is.
fn verify_then_delete(source: &Path, dest: &Path, expected_len: u64) -> Result<(), AnalyzeError> {
    let copied_len = std::fs::metadata(dest)?.len();
    if copied_len != expected_len {
        let _ = std::fs::remove_file(dest);
        return Err(AnalyzeError::OrganizeFailure(format!(
            "Copy verification failed for {} ({} bytes copied, {} expected)",
            source.display(),
            copied_len,
            expected_len
        )));
    }

    std::fs::remove_file(source)?;
    Ok(())
}

/// Create the directory if needed, then prove writability with a real
/// write-read-delete round trip. Existence and permission bits alone are
/// not trusted.
pub fn ensure_writable_dir(dir: &Path) -> Result<(), AnalyzeError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AnalyzeError::MisconfiguredOutputDirectory(format!(
            "Cannot create {}: {}",
            dir.display(),
            crate::error::user_friendly_io(&e)
        ))
    })?;

    let probe = dir.join(".write_test");
    let result = std::fs::write(&probe, b"test")
        .and_then(|_| std::fs::read(&probe))
        .and_then(|bytes| {
            if bytes == b"test" {
                Ok(())
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "write test read back different content",
                ))
            }
        });
    let _ = std::fs::remove_file(&probe);

    result.map_err(|e| {
        AnalyzeError::MisconfiguredOutputDirectory(format!(
            "Directory {} is not writable: {}",
            dir.display(),
            crate::error::user_friendly_io(&e)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_extension("mp4"));
        assert!(is_supported_extension("MOV"));
        assert!(!is_supported_extension("txt"));
        assert!(!is_supported_extension("png"));
    }

    #[test]
    fn test_validate_rejects_traversal_and_nul() {
        assert!(validate_path(Path::new("/a/../b.mp4")).is_err());
        assert!(validate_path(Path::new("/a/b\0.mp4")).is_err());
        assert!(validate_path(Path::new("relative/b.mp4")).is_err());
        assert!(validate_path(Path::new("/a/b.mp4")).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_path() {
        let long = format!("/{}", "x".repeat(5000));
        assert!(validate_path(Path::new(&long)).is_err());
    }

    #[test]
    fn test_canonicalize_resolves_dotted_input() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("clip.mp4"), "x").unwrap();

        // As typed on a command line this path fails validation outright
        let dotted = dir.path().join("sub/../clip.mp4");
        assert!(validate_path(&dotted).is_err());

        let canonical = canonicalize_input(&dotted).unwrap();
        assert!(canonical.is_absolute());
        assert!(canonical.ends_with("clip.mp4"));
        assert!(validate_path(&canonical).is_ok());
    }

    #[test]
    fn test_canonicalize_missing_input_is_friendly() {
        let err = canonicalize_input(Path::new("no/such/clip.mp4")).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidPath(_)));
        assert!(err.to_string().contains("no/such/clip.mp4"));
    }

    #[test]
    fn test_discovery_finds_nested_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("a.mp4"), "x").unwrap();
        std::fs::write(dir.path().join("sub/b.mkv"), "x").unwrap();
        std::fs::write(dir.path().join("sub/notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden.mp4"), "x").unwrap();
        std::fs::write(dir.path().join(".cache/c.mp4"), "x").unwrap();

        let files = find_video_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.mp4".to_string(), "b.mkv".to_string()]);
    }

    #[test]
    fn test_write_test_round_trip() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out");
        assert!(ensure_writable_dir(&target).is_ok());
        // Probe file cleaned up
        assert!(!target.join(".write_test").exists());
    }

    #[test]
    fn test_move_copies_then_deletes_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("bad.mp4");
        std::fs::write(&source, vec![7u8; 2048]).unwrap();

        let organizer = FileOrganizer::new(&dir.path().join("out")).unwrap();
        let dest = organizer.move_to_category(&source, Category::Corrupt).unwrap();

        assert!(!source.exists());
        assert!(dest.ends_with("corrupt/bad.mp4"));
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 2048);
    }

    #[test]
    fn test_unverified_copy_never_deletes_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("bad.mp4");
        std::fs::write(&source, vec![7u8; 2048]).unwrap();

        // A truncated destination stands in for a copy that lost bytes
        let dest = dir.path().join("bad_copy.mp4");
        std::fs::write(&dest, vec![7u8; 100]).unwrap();

        let err = verify_then_delete(&source, &dest, 2048).unwrap_err();
        assert!(matches!(err, AnalyzeError::OrganizeFailure(_)));
        assert!(source.exists());
        assert_eq!(std::fs::metadata(&source).unwrap().len(), 2048);
        // The bad copy is cleaned up
        assert!(!dest.exists());
    }

    #[test]
    fn test_move_missing_source_keeps_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let organizer = FileOrganizer::new(&dir.path().join("out")).unwrap();

        let result = organizer.move_to_category(&dir.path().join("ghost.mp4"), Category::Fixed);
        assert!(result.is_err());
        assert!(!dir.path().join("out/fixed/ghost.mp4").exists());
    }

    #[test]
    fn test_frames_dir_uses_source_stem() {
        let dir = TempDir::new().unwrap();
        let organizer = FileOrganizer::new(&dir.path().join("out")).unwrap();
        let frames = organizer.frames_dir(Path::new("/videos/holiday.mp4"));
        assert!(frames.ends_with("extracted_frames/holiday"));
    }
}

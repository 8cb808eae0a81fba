//! Audio file discovery
//!
//! Suffix-only allow-list matching, case-insensitive. The remote service is
//! the authority on whether a file actually decodes; discovery only filters
//! the obvious non-candidates.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Supported audio extensions (lowercase)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg", "aac", "wma"];

/// System noise skipped during directory enumeration
const IGNORE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", ".git"];

/// File discovery errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Cannot read directory contents
    #[error("I/O error scanning {0}: {1}")]
    Io(PathBuf, String),
}

/// Check if extension is in the allow-list
pub fn is_audio_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Check if file has a supported audio extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(is_audio_extension)
        .unwrap_or(false)
}

/// Collect audio files from a file or directory path.
///
/// A file path yields itself when allow-listed, otherwise nothing. A
/// directory is enumerated shallowly by default or fully with `recursive`;
/// symlinks are not followed. Results are deduplicated and sorted for
/// deterministic batch ordering.
pub fn find_audio_files(input: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    if !input.exists() {
        return Err(ScanError::PathNotFound(input.to_path_buf()));
    }

    if input.is_file() {
        return Ok(if is_audio_file(input) {
            vec![input.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut found = BTreeSet::new();

    if recursive {
        let walker = WalkDir::new(input)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.file_name()));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_file(entry.path()) {
                        found.insert(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }
    } else {
        let entries = std::fs::read_dir(input)
            .map_err(|e| ScanError::Io(input.to_path_buf(), e.to_string()))?;

        for entry in entries {
            match entry {
                Ok(entry) => {
                    if is_ignored(entry.file_name().as_os_str()) {
                        continue;
                    }
                    let path = entry.path();
                    if path.is_file() && is_audio_file(&path) {
                        found.insert(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }
    }

    Ok(found.into_iter().collect())
}

/// Union of discoveries over several file-or-directory inputs,
/// deduplicated and sorted.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    let mut all = BTreeSet::new();
    for input in inputs {
        all.extend(find_audio_files(input, recursive)?);
    }
    Ok(all.into_iter().collect())
}

fn is_ignored(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    IGNORE_NAMES.iter().any(|ignored| name == *ignored)
}

//! Scanner module for discovering the files each stage consumes.
//!
//! Stage 1 walks the whole input tree; stage 2 only looks at the top level of
//! the working directory, where stage 1 wrote its output flat.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collects every regular file under `root`.
///
/// The result is sorted so runs over the same tree plan tasks in the same
/// order. A missing root yields an empty list.
pub fn discover_inputs(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Collects files directly inside `dir` whose extension matches `extension`
/// (case-insensitive, without the leading dot). Subdirectories are ignored.
pub fn discover_intermediates(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extension))
        .collect();

    files.sort();
    files
}

/// Checks if a file has the given extension (case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Path of `path` relative to `root` for log lines, falling back to the full
/// path when `path` is outside `root`.
pub fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

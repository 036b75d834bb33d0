//! File system utilities for common traversal patterns

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Collect the files directly inside `path` whose extension matches, sorted by file name
///
/// Extension should not include the dot (e.g., "txt" not ".txt").
pub fn collect_files_with_extension(path: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|ext| e.eq_ignore_ascii_case(ext)));

        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Name of the text file holding section `index`
pub fn section_file_name(index: usize) -> String {
    format!("{index:03}.txt")
}

//! Chart file discovery.
//!
//! Finds S-57 base cells (`*.000` by default) under an input path. Results
//! are sorted so runs process files in a reproducible order.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Find chart files at `path`.
///
/// - A file is returned alone if its extension matches `extension`.
/// - A directory yields its immediate children, or the whole subtree when
///   `recursive`, filtered to regular files with that extension.
/// - Anything else, including a nonexistent path, yields nothing.
///
/// `extension` is compared without the leading dot. Results are sorted by
/// path string, byte by byte, not component by component.
pub fn find_files(path: &Path, recursive: bool, extension: &str) -> Vec<PathBuf> {
    let extension = extension.trim_start_matches('.');

    if path.is_file() {
        return if has_extension(path, extension) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    if !path.is_dir() {
        return Vec::new();
    }

    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), extension))
        .map(|entry| entry.into_path())
        .collect();

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    files
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

//! Path utilities for locating configuration files.

use std::path::{Path, PathBuf};

/// Returns an iterator that walks up the directory hierarchy towards the root.
///
/// Starts with `path` itself. If `stop_root_at` is given, iteration stops
/// after yielding that path.
pub(crate) fn ancestors<'a>(path: &'a Path, stop_root_at: Option<&Path>) -> PathAncestors<'a> {
    PathAncestors {
        current: Some(path),
        stop_at: stop_root_at.map(|p| p.to_path_buf()),
    }
}

/// An iterator over parent paths from a starting directory to a stopping directory.
pub(crate) struct PathAncestors<'a> {
    current: Option<&'a Path>,
    stop_at: Option<PathBuf>,
}

impl<'a> Iterator for PathAncestors<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<&'a Path> {
        let path = self.current?;
        self.current = path.parent();
        if self.stop_at.as_deref() == Some(path) {
            self.current = None;
        }
        Some(path)
    }
}

/// Files named `file_name` in `cwd` and its ancestors, outermost first.
pub(crate) fn config_files_outermost_first(
    cwd: &Path,
    stop_root_at: Option<&Path>,
    file_name: &str,
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ancestors(cwd, stop_root_at)
        .map(|dir| dir.join(file_name))
        .filter(|file| file.is_file())
        .collect();
    files.reverse();
    files
}

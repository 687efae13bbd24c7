//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep the `..` if there is nothing left to pop
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Resolve `path` against `cwd` unless it is already absolute, then normalize it.
///
/// For example, `./src/a.ts` with cwd `/work` becomes `/work/src/a.ts`.
pub fn ensure_absolute(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&cwd.join(path))
    }
}

/// Calculate the relative path from a directory to a target path.
///
/// Falls back to the target itself when no relative path exists
/// (e.g., different drive letters on Windows).
pub fn relative_path(from_dir: &Path, to_path: &Path) -> PathBuf {
    pathdiff::diff_paths(to_path, from_dir).unwrap_or_else(|| to_path.to_path_buf())
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if cfg!(windows) {
        rendered.replace('\\', "/")
    } else {
        rendered.into_owned()
    }
}

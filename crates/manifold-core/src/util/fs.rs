//! Filesystem utilities.

use manifold_types::{ManifoldError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand a leading tilde to the home directory.
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }

    path.to_path_buf()
}

/// Make a path absolute against the current directory.
pub fn absolutize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = expand_path(path);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Whether the path has a `.yaml` or `.yml` extension.
pub fn is_yaml_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

/// Whether the path has a `.json` extension.
pub fn is_json_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// List the YAML files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into.
pub fn list_yaml_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            ManifoldError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("unable to read directory {}: {}", dir.display(), e),
            ))
        })?;
        if entry.file_type().is_file() && is_yaml_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Find the nearest ancestor of `start` (inclusive) containing `marker`.
pub fn find_module_root(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).exists())
        .map(Path::to_path_buf)
}

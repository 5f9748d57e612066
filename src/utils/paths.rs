use std::io;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Absolute, normalised version of a path. The file does not need to exist
pub fn to_absolute_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    }
    .clean();

    Ok(absolute_path)
}

/// Hidden sibling that a file is written to before it is renamed into place.
/// Its name never carries the suffix of the original
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// A job has produced its artifact if the file exists and is not empty
pub fn artifact_is_complete(path: impl AsRef<Path>) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

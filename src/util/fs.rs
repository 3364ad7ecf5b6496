//! Filesystem utilities.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Remove a directory and all its contents, if it exists.
///
/// Calling this on a path that does not exist is a no-op.
pub fn reset_dir(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to remove directory: {}: {}", path.display(), e),
            )
        }),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to create directory: {}: {}", path.display(), e),
        )
    })
}

/// Remove a file if it exists.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Replace `path` with `contents` atomically.
///
/// The data is written to a uniquely-named temporary file in the same
/// directory and renamed over `path`, so readers observe either the old
/// file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    write_atomic_with(path, contents, |from, to| fs::rename(from, to))
}

/// Like [`write_atomic`], with the final rename step supplied by the caller.
///
/// If `rename` fails the temporary file is removed and `path` is untouched.
pub fn write_atomic_with<F>(path: &Path, contents: &[u8], rename: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    persist_with(tmp, path, rename)
}

fn persist_with<F>(tmp: NamedTempFile, path: &Path, rename: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    // Dropping the guard after a successful rename finds nothing to delete.
    let temp_path = tmp.into_temp_path();
    rename(&*temp_path, path)
}

/// Check whether `path` is a regular file with an executable bit set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

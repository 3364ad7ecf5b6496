//! Archive extraction with format detection and layout normalization.
//!
//! Upstream source archives are inconsistent about wrapping their payload
//! in a `name-version/` directory. [`extract`] hides that difference: the
//! destination directory is always the logical source root.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use miette::Diagnostic;
use tar::Archive;
use thiserror::Error;

use crate::util::fs::ensure_dir;
use crate::util::process::{output_tail, ProcessBuilder};

/// Error while extracting an archive.
#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("archive not found: {}", path.display())]
    #[diagnostic(code(crossport::archive::not_found))]
    NotFound { path: PathBuf },

    #[error("unsupported archive format: {}", path.display())]
    #[diagnostic(
        code(crossport::archive::unsupported_format),
        help("supported formats are .tar.gz, .tgz, .tar.xz, .txz, .tar.bz2, .tbz2 and .zip")
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to extract `{label}` from {}: {reason}", path.display())]
    #[diagnostic(
        code(crossport::archive::extraction_failed),
        help("the archive may be corrupt; delete it and rerun to download it again")
    )]
    ExtractionFailed {
        label: String,
        path: PathBuf,
        reason: String,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> ArchiveError {
        let context = context.into();
        move |source| ArchiveError::Io { context, source }
    }
}

/// Archive formats understood by [`extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file name suffix.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveFormat::TarXz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz")
        {
            Some(ArchiveFormat::TarBz2)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive` into `dest`.
///
/// If `dest` already exists the archive is assumed to be extracted and
/// nothing is inspected; call [`crate::util::fs::reset_dir`] first to force
/// a fresh extraction.
///
/// Extraction happens in a private temporary directory next to `dest`.
/// When the archive's top level is a single directory, that directory
/// becomes `dest`; otherwise the temporary directory itself does.
pub fn extract(archive: &Path, dest: &Path, label: &str) -> Result<(), ArchiveError> {
    if !archive.is_file() {
        return Err(ArchiveError::NotFound {
            path: archive.to_path_buf(),
        });
    }

    if dest.exists() {
        tracing::debug!("{} already extracted at {}", label, dest.display());
        return Ok(());
    }

    let format = ArchiveFormat::detect(archive).ok_or_else(|| ArchiveError::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent).map_err(ArchiveError::io(format!(
        "failed to create directory: {}",
        parent.display()
    )))?;

    // Removed on drop, which covers every failure path below.
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}-extract-", label))
        .tempdir_in(parent)
        .map_err(ArchiveError::io(format!(
            "failed to create temporary directory in {}",
            parent.display()
        )))?;

    tracing::info!("Extracting {} ({})", label, archive.display());

    let unpacked = match format {
        ArchiveFormat::TarGz => unpack_tar_gz(archive, staging.path()),
        ArchiveFormat::TarXz => unpack_with_tar(archive, staging.path(), "-xJf"),
        ArchiveFormat::TarBz2 => unpack_with_tar(archive, staging.path(), "-xjf"),
        ArchiveFormat::Zip => unpack_zip(archive, staging.path()),
    };
    unpacked.map_err(|reason| ArchiveError::ExtractionFailed {
        label: label.to_string(),
        path: archive.to_path_buf(),
        reason,
    })?;

    let root = single_root(staging.path()).map_err(ArchiveError::io(format!(
        "failed to read directory: {}",
        staging.path().display()
    )))?;

    let moved = match root {
        Some(inner) => fs::rename(&inner, dest),
        None => fs::rename(staging.path(), dest),
    };
    moved.map_err(ArchiveError::io(format!(
        "failed to move extracted tree to {}",
        dest.display()
    )))?;

    tracing::debug!("{} extracted to {}", label, dest.display());
    Ok(())
}

/// The sole top-level entry of `dir`, if there is exactly one and it is a
/// directory.
fn single_root(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?;

    let first = match entries.next() {
        Some(entry) => entry?,
        None => return Ok(None),
    };
    if entries.next().is_some() {
        return Ok(None);
    }

    // file_type() does not follow symlinks: a link to a directory is not a root.
    if first.file_type()?.is_dir() {
        Ok(Some(first.path()))
    } else {
        Ok(None)
    }
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = Archive::new(decoder);
    archive.set_preserve_permissions(true);

    for entry in archive.entries().map_err(|e| e.to_string())? {
        let mut entry = entry.map_err(|e| e.to_string())?;

        // unpack_in refuses entries that would escape `dest`.
        let unpacked = entry.unpack_in(dest).map_err(|e| e.to_string())?;
        if !unpacked {
            let path = entry.path().map(|p| p.display().to_string());
            tracing::debug!("skipping unsafe tar entry {:?}", path);
        }
    }

    Ok(())
}

fn unpack_with_tar(archive_path: &Path, dest: &Path, flags: &str) -> Result<(), String> {
    let output = ProcessBuilder::new("tar")
        .arg(flags)
        .arg(archive_path)
        .arg("-C")
        .arg(dest)
        .exec()
        .map_err(|e| e.to_string())?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "tar exited with {}: {}",
            output.status,
            output_tail(&output.stderr, 5)
        ))
    }
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| format!("failed to open zip: {}", e))?;

    // Restores unix modes and symlinks, which the NDK relies on.
    archive
        .extract(dest)
        .map_err(|e| format!("failed to read zip entry: {}", e))
}

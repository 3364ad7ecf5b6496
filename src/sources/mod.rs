//! Source archives: downloading and unpacking.

pub mod archive;
pub mod fetch;

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

pub use archive::{extract, ArchiveError, ArchiveFormat};
pub use fetch::{download_path, fetch_source, verify_checksum, FetchError, Fetcher, HttpFetcher};

/// Error from [`fetch_and_extract`].
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),
}

/// Download `url` into `downloads` (if needed) and extract it to `dest`.
///
/// Returns the path of the cached archive.
pub fn fetch_and_extract(
    fetcher: &dyn Fetcher,
    url: &str,
    downloads: &Path,
    dest: &Path,
    label: &str,
    sha256: Option<&str>,
) -> Result<PathBuf, SourceError> {
    let archive = fetch_source(fetcher, url, downloads, sha256)?;
    extract(&archive, dest, label)?;
    Ok(archive)
}

//! Source downloads.
//!
//! Downloads are cached by file name in a downloads directory and are
//! never re-fetched once present. With an expected checksum, a file that
//! does not match is deleted so the next run downloads it again.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use miette::Diagnostic;
use thiserror::Error;
use url::Url;

use crate::util::fs::{ensure_dir, remove_file_if_exists};
use crate::util::hash::sha256_file;

/// Error while downloading a source archive.
#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid download URL `{url}`")]
    #[diagnostic(code(crossport::fetch::invalid_url))]
    InvalidUrl { url: String },

    #[error("failed to download {url}")]
    #[diagnostic(code(crossport::fetch::http))]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download {url}: HTTP {status}")]
    #[diagnostic(code(crossport::fetch::status))]
    Status { url: String, status: u16 },

    #[error("checksum mismatch for {}:\n  expected: {expected}\n  actual:   {actual}", path.display())]
    #[diagnostic(
        code(crossport::fetch::checksum_mismatch),
        help("the corrupt file was deleted; rerun to download it again")
    )]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> FetchError {
        let context = context.into();
        move |source| FetchError::Io { context, source }
    }
}

/// Something that can place the contents of a URL at a local path.
pub trait Fetcher {
    /// Download `url` to `dest`.
    ///
    /// Implementations must not leave a partial file at `dest` on failure.
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// [`Fetcher`] backed by a blocking HTTP client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("crossport/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(900))
            .build()
            .map_err(|source| FetchError::Http {
                url: String::new(),
                source,
            })?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        tracing::info!("Fetching {}", url);

        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let mut response = self.client.get(url).send().map_err(http_err)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(dir).map_err(FetchError::io(format!(
            "failed to create directory: {}",
            dir.display()
        )))?;

        // Written next to the destination and renamed into place only once
        // the whole body has arrived.
        let mut tmp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)
            .map_err(FetchError::io("failed to create download file"))?;

        let progress = progress_bar(response.content_length());
        {
            let mut writer = progress.wrap_write(tmp.as_file_mut());
            response.copy_to(&mut writer).map_err(http_err)?;
            writer
                .flush()
                .map_err(FetchError::io("failed to write download"))?;
        }
        progress.finish_and_clear();

        tmp.persist(dest).map_err(|e| FetchError::Io {
            context: format!("failed to save download to {}", dest.display()),
            source: e.error,
        })?;

        tracing::debug!("Downloaded {} to {}", url, dest.display());
        Ok(())
    }
}

fn progress_bar(len: Option<u64>) -> ProgressBar {
    match len {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "  {bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                bar.set_style(style);
            }
            bar
        }
        None => ProgressBar::new_spinner(),
    }
}

/// Cache path for `url`: the last segment of its path inside `downloads`.
pub fn download_path(url: &str, downloads: &Path) -> Result<PathBuf, FetchError> {
    let invalid = || FetchError::InvalidUrl {
        url: url.to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let file_name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or_else(invalid)?;

    Ok(downloads.join(file_name))
}

/// Download `url` into `downloads` unless it is already there.
///
/// With `sha256`, both cached and fresh files are verified; a mismatching
/// file is deleted before the error is returned.
pub fn fetch_source(
    fetcher: &dyn Fetcher,
    url: &str,
    downloads: &Path,
    sha256: Option<&str>,
) -> Result<PathBuf, FetchError> {
    let dest = download_path(url, downloads)?;

    if dest.is_file() {
        tracing::debug!("{} already downloaded", dest.display());
    } else {
        ensure_dir(downloads).map_err(FetchError::io(format!(
            "failed to create directory: {}",
            downloads.display()
        )))?;
        fetcher.fetch(url, &dest)?;
    }

    if let Some(expected) = sha256 {
        verify_checksum(&dest, expected)?;
    }

    Ok(dest)
}

/// Check `path` against `expected`, deleting it on mismatch.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), FetchError> {
    let actual = sha256_file(path).map_err(FetchError::io(format!(
        "failed to hash {}",
        path.display()
    )))?;

    if actual.eq_ignore_ascii_case(expected.trim()) {
        tracing::debug!("Checksum verified for {}", path.display());
        return Ok(());
    }

    remove_file_if_exists(path).map_err(FetchError::io(format!(
        "failed to remove {}",
        path.display()
    )))?;

    Err(FetchError::ChecksumMismatch {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingFetcher;
    use crate::util::hash::sha256_str;
    use tempfile::TempDir;

    #[test]
    fn test_download_path() {
        let path = download_path(
            "https://zlib.net/fossils/zlib-1.3.1.tar.gz",
            Path::new("/dl"),
        )
        .unwrap();
        assert_eq!(path, Path::new("/dl/zlib-1.3.1.tar.gz"));

        assert!(matches!(
            download_path("https://example.com/", Path::new("/dl")),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            download_path("not a url", Path::new("/dl")),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_fetch_source_skips_existing_file() {
        let tmp = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::new();
        fetcher.serve("https://example.com/lib-1.0.tar.gz", b"payload".to_vec());

        let url = "https://example.com/lib-1.0.tar.gz";
        let first = fetch_source(&fetcher, url, tmp.path(), None).unwrap();
        let second = fetch_source(&fetcher, url, tmp.path(), None).unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), vec![url.to_string()]);
        assert_eq!(std::fs::read(&first).unwrap(), b"payload");
    }

    #[test]
    fn test_fetch_source_verifies_checksum() {
        let tmp = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::new();
        let url = "https://example.com/lib-1.0.tar.gz";
        fetcher.serve(url, b"payload".to_vec());

        let good = sha256_str("payload");
        let path = fetch_source(&fetcher, url, tmp.path(), Some(&good)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_checksum_mismatch_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::new();
        let url = "https://example.com/lib-1.0.tar.gz";
        fetcher.serve(url, b"tampered".to_vec());

        let expected = sha256_str("payload");
        let err = fetch_source(&fetcher, url, tmp.path(), Some(&expected)).unwrap_err();

        assert!(matches!(err, FetchError::ChecksumMismatch { .. }));
        assert!(!tmp.path().join("lib-1.0.tar.gz").exists());

        // A rerun downloads again rather than trusting the bad bytes.
        fetcher.serve(url, b"payload".to_vec());
        fetch_source(&fetcher, url, tmp.path(), Some(&expected)).unwrap();
        assert_eq!(fetcher.calls().len(), 2);
    }
}

//! Test utilities and mocks for crossport unit tests.
//!
//! Builds normally download archives and run compilers. The mocks here
//! stand in for both so the marker, driver and pipeline logic can be
//! exercised without network access or an NDK.
//!
//! # Example
//!
//! ```rust,ignore
//! use crossport::test_support::{tar_gz_bytes, CountingStrategy, RecordingFetcher};
//!
//! #[test]
//! fn test_example() {
//!     let fetcher = RecordingFetcher::new();
//!     fetcher.serve("https://example.com/zlib-1.3.1.tar.gz", tar_gz_bytes(&[
//!         ("zlib-1.3.1/CMakeLists.txt", "project(zlib)"),
//!     ]));
//!
//!     let strategy = CountingStrategy::new();
//!     // Drive a build, then check fetcher.calls() and strategy.builds()...
//! }
//! ```

pub mod fixtures;

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use crate::builder::driver::BuildError;
use crate::builder::strategy::{BuildStrategy, StrategyContext};
use crate::sources::{FetchError, Fetcher};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Fetcher serving canned bodies and recording every request.
///
/// Unknown URLs fail with HTTP 404.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, replacing any previous body.
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), body);
        }
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Fetcher for RecordingFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }

        let body = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(url).cloned());

        match body {
            Some(body) => fs::write(dest, body).map_err(|source| FetchError::Io {
                context: format!("failed to write {}", dest.display()),
                source,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Strategy that records invocations instead of compiling.
///
/// A successful build installs `lib/lib<component>.a` into the prefix.
#[derive(Debug, Default)]
pub struct CountingStrategy {
    builds: Cell<usize>,
    fail: bool,
}

impl CountingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A strategy whose build step always fails.
    pub fn failing() -> Self {
        CountingStrategy {
            builds: Cell::new(0),
            fail: true,
        }
    }

    /// Number of times `build` was called.
    pub fn builds(&self) -> usize {
        self.builds.get()
    }
}

impl BuildStrategy for CountingStrategy {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        _extra_args: &[String],
    ) -> Result<(), BuildError> {
        self.builds.set(self.builds.get() + 1);

        if self.fail {
            return Err(BuildError::CommandFailed {
                component: component.to_string(),
                step: "build",
                command: "make".to_string(),
                status: "2".to_string(),
                output: "simulated failure".to_string(),
            });
        }

        if !src_dir.is_dir() {
            return Err(BuildError::SourceMissing {
                component: component.to_string(),
                path: src_dir.to_path_buf(),
            });
        }

        let lib_dir = ctx.prefix.join("lib");
        fs::create_dir_all(&lib_dir)
            .and_then(|_| fs::write(lib_dir.join(format!("lib{}.a", component)), "!<arch>\n"))
            .map_err(BuildError::io("failed to install test library"))
    }
}

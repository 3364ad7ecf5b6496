//! Per-run build configuration.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::arch::{Arch, UnknownArch};

/// Lowest Android API level the NDK toolchain wrappers are shipped for.
pub const MIN_API_LEVEL: u32 = 21;

/// Prebuilt toolchain directory name for the machine we are running on.
#[cfg(target_os = "macos")]
pub const HOST_TAG: &str = "darwin-x86_64";
#[cfg(target_os = "windows")]
pub const HOST_TAG: &str = "windows-x86_64";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const HOST_TAG: &str = "linux-x86_64";

/// Invalid build configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownArch(#[from] UnknownArch),

    #[error("API level {0} is not supported")]
    #[diagnostic(
        code(crossport::config::api_level),
        help("use an API level of 21 or newer")
    )]
    ApiLevel(u32),

    #[error("parallel job count must be at least 1")]
    #[diagnostic(code(crossport::config::jobs))]
    Jobs,
}

/// Immutable description of one target build.
///
/// Created once at the start of a run and shared by every component build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    arch: Arch,
    api_level: u32,
    target_triple: String,
    host_tag: String,
    jobs: usize,
    workspace: PathBuf,
}

impl BuildConfig {
    /// Validate the raw settings and derive the target triple.
    pub fn new(
        arch: &str,
        api_level: u32,
        jobs: usize,
        workspace: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let arch: Arch = arch.parse()?;
        if api_level < MIN_API_LEVEL {
            return Err(ConfigError::ApiLevel(api_level));
        }
        if jobs == 0 {
            return Err(ConfigError::Jobs);
        }

        Ok(BuildConfig {
            arch,
            api_level,
            target_triple: arch.target_triple().to_string(),
            host_tag: HOST_TAG.to_string(),
            jobs,
            workspace: workspace.into(),
        })
    }

    /// Override the detected host tag.
    pub fn with_host_tag(mut self, host_tag: impl Into<String>) -> Self {
        self.host_tag = host_tag.into();
        self
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    /// GNU target triple (`aarch64-linux-android`).
    pub fn target_triple(&self) -> &str {
        &self.target_triple
    }

    pub fn host_tag(&self) -> &str {
        &self.host_tag
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Directory name of this target under the workspace, e.g.
    /// `aarch64-linux-android24`.
    pub fn target_name(&self) -> String {
        format!("{}{}", self.target_triple, self.api_level)
    }
}

/// Default parallelism: one job per available core.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

//! Toolchain resolution.
//!
//! Resolution moves through three states, each its own type:
//!
//! - [`NdkLocator`]: nothing located yet
//! - [`Ndk`]: an NDK root on disk
//! - [`ToolchainDescriptor`]: every tool path and flag resolved
//!
//! A descriptor is computed once per run and handed to every component
//! build. Native descriptors for host-side helpers are built with
//! [`ToolchainDescriptor::native`] and skip the NDK entirely.

mod env;
mod ndk;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::Arch;
use crate::sources::SourceError;

pub use env::{default_layer, resolve, EnvOverrides, Layer, ResolvedVar, TOOLCHAIN_VARS};
pub use ndk::{ndk_download_url, Ndk, NdkLocator, DEFAULT_NDK_VERSION};

/// Failure to produce a usable toolchain. Always fatal for a run.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolchainError {
    #[error("Android NDK not found at {}", path.display())]
    #[diagnostic(
        code(crossport::toolchain::ndk_not_found),
        help("set ANDROID_NDK_HOME, pass --ndk, or allow the NDK to be downloaded")
    )]
    NdkNotFound { path: PathBuf },

    #[error("no NDK download is available for host `{os}`")]
    #[diagnostic(
        code(crossport::toolchain::host_unsupported),
        help("install the NDK manually and set ANDROID_NDK_HOME, or set [ndk] url")
    )]
    HostUnsupported { os: String },

    #[error("failed to obtain the Android NDK")]
    #[diagnostic(code(crossport::toolchain::ndk_fetch))]
    NdkFetch(#[source] SourceError),

    #[error("NDK has no prebuilt toolchain for host `{host_tag}`")]
    #[diagnostic(
        code(crossport::toolchain::missing),
        help("expected directory: {}", path.display())
    )]
    ToolchainMissing { path: PathBuf, host_tag: String },

    #[error("NDK compiler not found: {}", path.display())]
    #[diagnostic(
        code(crossport::toolchain::compiler_missing),
        help("this NDK may not support API level {api_level}; try a lower --api")
    )]
    CompilerMissing { path: PathBuf, api_level: u32 },
}

/// Whether a descriptor targets Android or the build machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    Cross {
        arch: Arch,
        api_level: u32,
        ndk_root: PathBuf,
        sysroot: PathBuf,
        bin_dir: PathBuf,
    },
    Native,
}

/// Resolved compilers, tools and flags for one target.
#[derive(Debug, Clone)]
pub struct ToolchainDescriptor {
    target: TargetKind,
    staging: PathBuf,
    vars: BTreeMap<String, ResolvedVar>,
}

impl ToolchainDescriptor {
    pub(crate) fn cross(
        target: TargetKind,
        staging: PathBuf,
        vars: BTreeMap<String, ResolvedVar>,
    ) -> Self {
        ToolchainDescriptor {
            target,
            staging,
            vars,
        }
    }

    /// Descriptor for the build machine's own compiler.
    ///
    /// Cross overrides from the environment are deliberately not applied
    /// here; they name the Android compilers.
    pub fn native(staging: impl Into<PathBuf>) -> Self {
        let staging = staging.into();
        let vars = resolve(&EnvOverrides::none(), &BTreeMap::new(), &default_layer());
        ToolchainDescriptor {
            target: TargetKind::Native,
            staging,
            vars,
        }
    }

    pub fn target(&self) -> &TargetKind {
        &self.target
    }

    pub fn is_cross(&self) -> bool {
        matches!(self.target, TargetKind::Cross { .. })
    }

    pub fn arch(&self) -> Option<Arch> {
        match self.target {
            TargetKind::Cross { arch, .. } => Some(arch),
            TargetKind::Native => None,
        }
    }

    pub fn api_level(&self) -> Option<u32> {
        match self.target {
            TargetKind::Cross { api_level, .. } => Some(api_level),
            TargetKind::Native => None,
        }
    }

    /// GNU triple of the machine the output runs on, if cross compiling.
    pub fn target_triple(&self) -> Option<&'static str> {
        self.arch().map(|a| a.target_triple())
    }

    pub fn ndk_root(&self) -> Option<&Path> {
        match self.target {
            TargetKind::Cross { ref ndk_root, .. } => Some(ndk_root),
            TargetKind::Native => None,
        }
    }

    pub fn sysroot(&self) -> Option<&Path> {
        match self.target {
            TargetKind::Cross { ref sysroot, .. } => Some(sysroot),
            TargetKind::Native => None,
        }
    }

    /// Directory holding the NDK's compiler wrappers and LLVM tools.
    pub fn bin_dir(&self) -> Option<&Path> {
        match self.target {
            TargetKind::Cross { ref bin_dir, .. } => Some(bin_dir),
            TargetKind::Native => None,
        }
    }

    /// Prefix that dependencies are installed into and searched from.
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.value.as_str())
    }

    pub fn resolved(&self) -> &BTreeMap<String, ResolvedVar> {
        &self.vars
    }

    /// Whether `key` was set explicitly rather than derived.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.vars
            .get(key)
            .is_some_and(|v| v.layer == Layer::Override)
    }

    pub fn cc(&self) -> &str {
        self.var("CC").unwrap_or("cc")
    }

    pub fn cxx(&self) -> &str {
        self.var("CXX").unwrap_or("c++")
    }

    pub fn ar(&self) -> &str {
        self.var("AR").unwrap_or("ar")
    }

    pub fn ranlib(&self) -> &str {
        self.var("RANLIB").unwrap_or("ranlib")
    }

    pub fn strip(&self) -> &str {
        self.var("STRIP").unwrap_or("strip")
    }

    pub fn cflags(&self) -> &str {
        self.var("CFLAGS").unwrap_or("")
    }

    pub fn cppflags(&self) -> &str {
        self.var("CPPFLAGS").unwrap_or("")
    }

    pub fn ldflags(&self) -> &str {
        self.var("LDFLAGS").unwrap_or("")
    }

    /// Environment to pass to every subprocess of a component build.
    pub fn env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
    }

    /// `--host=<triple>` for autotools, when cross compiling.
    pub fn host_flag(&self) -> Option<String> {
        self.target_triple().map(|t| format!("--host={}", t))
    }

    /// `--build=<triple>` naming the machine running the build.
    pub fn build_flag(&self) -> String {
        format!("--build={}", native_triple())
    }
}

/// GNU triple of the machine running the build.
pub fn native_triple() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "macos" => format!("{}-apple-darwin", arch),
        "windows" => format!("{}-pc-windows-gnu", arch),
        "linux" if arch == "x86_64" => "x86_64-pc-linux-gnu".to_string(),
        "linux" => format!("{}-unknown-linux-gnu", arch),
        other => format!("{}-unknown-{}", arch, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_descriptor_has_no_host_flag() {
        let tc = ToolchainDescriptor::native("/ws/host/staging");

        assert!(!tc.is_cross());
        assert_eq!(tc.host_flag(), None);
        assert_eq!(tc.cc(), "cc");
        assert_eq!(tc.cflags(), "-O2");
        assert_eq!(tc.staging(), Path::new("/ws/host/staging"));
        assert!(tc.build_flag().starts_with("--build="));
    }

    #[test]
    fn test_native_triple_names_this_machine() {
        let triple = native_triple();
        assert!(triple.starts_with(std::env::consts::ARCH));
    }
}

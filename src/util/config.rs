//! Configuration file support for Crossport.
//!
//! Crossport reads two configuration files:
//! - Global: `<config dir>/crossport/config.toml` - User-wide defaults
//! - Project: `./crossport.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both, and the process environment takes
//! precedence over `[toolchain]` for toolchain variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::{EnvOverrides, DEFAULT_NDK_VERSION};
use crate::core::config::default_jobs;
use crate::core::SourceOverride;

pub const DEFAULT_ARCH: &str = "aarch64";
pub const DEFAULT_API_LEVEL: u32 = 24;
pub const DEFAULT_WORKSPACE: &str = "workspace";

/// Crossport configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Target and workspace settings
    pub build: BuildSettings,

    /// Android NDK settings
    pub ndk: NdkSettings,

    /// Toolchain variable overrides
    pub toolchain: ToolchainSettings,

    /// Per-component source overrides, keyed by component name
    pub sources: BTreeMap<String, SourceOverride>,

    /// Post-build and packaging settings
    pub package: PackageSettings,
}

/// Target and workspace settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Target architecture (aarch64, armv7a, x86_64, i686)
    pub arch: Option<String>,

    /// Minimum Android API level
    pub api_level: Option<u32>,

    /// Parallel jobs per component build (None = one per core)
    pub jobs: Option<usize>,

    /// Workspace root
    pub workspace: Option<PathBuf>,
}

impl BuildSettings {
    pub fn arch(&self) -> &str {
        self.arch.as_deref().unwrap_or(DEFAULT_ARCH)
    }

    pub fn api_level(&self) -> u32 {
        self.api_level.unwrap_or(DEFAULT_API_LEVEL)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs)
    }

    pub fn workspace(&self) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE))
    }
}

/// Android NDK settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NdkSettings {
    /// NDK release to download, e.g. `r26d`
    pub version: Option<String>,

    /// Download URL replacing the official one
    pub url: Option<String>,

    /// Expected SHA-256 of the NDK download
    pub sha256: Option<String>,

    /// An installed NDK to use instead of downloading
    pub home: Option<PathBuf>,
}

impl NdkSettings {
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_NDK_VERSION)
    }
}

/// `[toolchain]` overrides. Each maps onto one toolchain variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub cc: Option<String>,
    pub cxx: Option<String>,
    #[serde(rename = "as")]
    pub assembler: Option<String>,
    pub ar: Option<String>,
    pub ranlib: Option<String>,
    pub ld: Option<String>,
    pub strip: Option<String>,
    pub cflags: Option<String>,
    pub cxxflags: Option<String>,
    pub cppflags: Option<String>,
    pub ldflags: Option<String>,
}

impl ToolchainSettings {
    fn fields(&self) -> [(&'static str, &Option<String>); 11] {
        [
            ("CC", &self.cc),
            ("CXX", &self.cxx),
            ("AS", &self.assembler),
            ("AR", &self.ar),
            ("RANLIB", &self.ranlib),
            ("LD", &self.ld),
            ("STRIP", &self.strip),
            ("CFLAGS", &self.cflags),
            ("CXXFLAGS", &self.cxxflags),
            ("CPPFLAGS", &self.cppflags),
            ("LDFLAGS", &self.ldflags),
        ]
    }

    /// The configured values as an override layer.
    pub fn overrides(&self) -> EnvOverrides {
        EnvOverrides::from_pairs(
            self.fields()
                .into_iter()
                .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
        )
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainSettings) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.cc, other.cc);
        take(&mut self.cxx, other.cxx);
        take(&mut self.assembler, other.assembler);
        take(&mut self.ar, other.ar);
        take(&mut self.ranlib, other.ranlib);
        take(&mut self.ld, other.ld);
        take(&mut self.strip, other.strip);
        take(&mut self.cflags, other.cflags);
        take(&mut self.cxxflags, other.cxxflags);
        take(&mut self.cppflags, other.cppflags);
        take(&mut self.ldflags, other.ldflags);
    }
}

/// Post-build and packaging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Strip shared objects in the output (default: true)
    pub strip: Option<bool>,

    /// Product name used in the archive name (default: the product component)
    pub name: Option<String>,
}

impl PackageSettings {
    pub fn strip(&self) -> bool {
        self.strip.unwrap_or(true)
    }
}

impl Settings {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Settings) {
        // Build settings
        if other.build.arch.is_some() {
            self.build.arch = other.build.arch;
        }
        if other.build.api_level.is_some() {
            self.build.api_level = other.build.api_level;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.workspace.is_some() {
            self.build.workspace = other.build.workspace;
        }

        // NDK settings
        if other.ndk.version.is_some() {
            self.ndk.version = other.ndk.version;
        }
        if other.ndk.url.is_some() {
            self.ndk.url = other.ndk.url;
        }
        if other.ndk.sha256.is_some() {
            self.ndk.sha256 = other.ndk.sha256;
        }
        if other.ndk.home.is_some() {
            self.ndk.home = other.ndk.home;
        }

        self.toolchain.merge(other.toolchain);

        // Sources merge field by field, so a project can pin a checksum
        // without restating the version.
        for (name, source) in other.sources {
            let entry = self.sources.entry(name).or_default();
            if source.version.is_some() {
                entry.version = source.version;
            }
            if source.url.is_some() {
                entry.url = source.url;
            }
            if source.sha256.is_some() {
                entry.sha256 = source.sha256;
            }
            if source.extra_args.is_some() {
                entry.extra_args = source.extra_args;
            }
        }

        // Package settings
        if other.package.strip.is_some() {
            self.package.strip = other.package.strip;
        }
        if other.package.name.is_some() {
            self.package.name = other.package.name;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (./crossport.toml)
/// 2. Global config (<config dir>/crossport/config.toml)
/// 3. Defaults
///
/// A file that exists but does not parse is an error.
pub fn load_settings(global_path: Option<&Path>, project_path: &Path) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        settings.merge(Settings::load(global_path)?);
    }

    if project_path.exists() {
        settings.merge(Settings::load(project_path)?);
    }

    Ok(settings)
}

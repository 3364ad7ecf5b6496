//! Global context for Crossport operations.
//!
//! Provides centralized access to configuration paths and the snapshot of
//! the process environment taken at startup.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::builder::toolchain::EnvOverrides;
use crate::util::config::{load_settings, Settings};

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "crossport.toml";

/// Environment variables naming an installed NDK, in priority order.
pub const NDK_ENV_VARS: [&str; 3] = ["ANDROID_NDK_HOME", "ANDROID_NDK_ROOT", "NDK_HOME"];

/// Project directories for Crossport
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "crossport", "crossport"));

/// Global context containing configuration paths and environment.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the global config file
    config_dir: Option<PathBuf>,

    /// Toolchain variables set in the environment at startup
    env: EnvOverrides,

    /// NDK root named by the environment, if any
    ndk_home: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext, capturing the process environment.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let config_dir = PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.config_dir().to_path_buf());

        GlobalContext {
            cwd,
            config_dir,
            env: EnvOverrides::from_env(),
            ndk_home: ndk_home_from(|key| std::env::var_os(key).map(PathBuf::from)),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join("config.toml"))
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(PROJECT_CONFIG_FILE)
    }

    /// Load global and project configuration, merged.
    pub fn load_settings(&self) -> Result<Settings> {
        let global = self.global_config_path();
        load_settings(global.as_deref(), &self.project_config_path())
    }

    /// Toolchain variables captured from the environment.
    pub fn env_overrides(&self) -> &EnvOverrides {
        &self.env
    }

    /// NDK root from `ANDROID_NDK_HOME` and friends.
    pub fn ndk_home(&self) -> Option<&Path> {
        self.ndk_home.as_deref()
    }

    /// Make `path` absolute relative to the working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

fn ndk_home_from<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    NDK_ENV_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .find(|path| !path.as_os_str().is_empty())
}

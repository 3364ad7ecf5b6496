//! Workspace directory layout.
//!
//! ```text
//! workspace/
//! ├── ndk/                         # NDK download and extraction
//! ├── host/                        # native helper interpreter build
//! ├── dist/                        # final distribution archives
//! └── <triple><api>/
//!     ├── downloads/               # source archives
//!     ├── src/<component>/         # extracted source trees
//!     ├── staging/                 # install prefix shared by dependencies
//!     │   └── .built/<component>.marker
//!     └── output/                  # install prefix of the final product
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::core::config::BuildConfig;
use crate::util::fs::ensure_dir;

/// Name of the marker directory inside the staging prefix.
pub const MARKERS_DIR: &str = ".built";

/// Directory tree for one build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    workspace: PathBuf,
    target_dir: PathBuf,
}

impl WorkspaceLayout {
    /// Layout for a cross target named `target` inside `workspace`.
    pub fn new(workspace: impl Into<PathBuf>, target: &str) -> Self {
        let workspace = workspace.into();
        let target_dir = workspace.join(target);
        WorkspaceLayout {
            workspace,
            target_dir,
        }
    }

    /// Layout for the target described by `config`.
    pub fn for_config(config: &BuildConfig) -> Self {
        Self::new(config.workspace(), &config.target_name())
    }

    /// Layout used for native builds of host-side helpers.
    pub fn host(workspace: impl Into<PathBuf>) -> Self {
        Self::new(workspace, "host")
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn downloads(&self) -> PathBuf {
        self.target_dir.join("downloads")
    }

    pub fn src_root(&self) -> PathBuf {
        self.target_dir.join("src")
    }

    /// Extracted source tree of a single component.
    pub fn src_dir(&self, component: &str) -> PathBuf {
        self.src_root().join(component)
    }

    pub fn staging(&self) -> PathBuf {
        self.target_dir.join("staging")
    }

    pub fn markers(&self) -> PathBuf {
        self.staging().join(MARKERS_DIR)
    }

    pub fn output(&self) -> PathBuf {
        self.target_dir.join("output")
    }

    /// Install prefix of natively built helpers (host layout only).
    pub fn install(&self) -> PathBuf {
        self.target_dir.join("install")
    }

    /// Where the NDK is downloaded and unpacked when not provided externally.
    pub fn ndk_root(&self) -> PathBuf {
        self.workspace.join("ndk")
    }

    pub fn dist(&self) -> PathBuf {
        self.workspace.join("dist")
    }

    /// Create every directory of the tree that must exist before building.
    pub fn create_all(&self) -> io::Result<()> {
        for dir in [
            self.downloads(),
            self.src_root(),
            self.staging(),
            self.markers(),
            self.output(),
        ] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }
}

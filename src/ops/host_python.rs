//! The host interpreter used to drive the cross build.
//!
//! Cross-compiling Python needs a Python of the same `major.minor` series
//! running on the build machine. One from PATH is reused when it reports a
//! matching version; otherwise it is built natively under
//! `workspace/host/`, with its own markers.

use std::path::{Path, PathBuf};

use crate::builder::driver::{BuildError, BuildOutcome, ComponentDriver};
use crate::builder::marker::MarkerCache;
use crate::builder::strategy::Python;
use crate::builder::toolchain::ToolchainDescriptor;
use crate::core::WorkspaceLayout;
use crate::util::fs::is_executable;
use crate::util::process::{find_executable, tool_version};

/// Component name of the native interpreter build.
const HOST_COMPONENT: &str = "python";

/// Find an installed interpreter whose version belongs to `series`.
///
/// `python<series>` is preferred over a generic `python3`.
pub fn find_host_python(series: &str) -> Option<PathBuf> {
    let candidates = [format!("python{}", series), "python3".to_string()];

    candidates.iter().find_map(|name| {
        let path = find_executable(name)?;
        let version = tool_version(&path)?;
        if version_matches(&version, series) {
            tracing::debug!("Found host {} at {}", version, path.display());
            Some(path)
        } else {
            tracing::debug!("Ignoring {} ({}), need {}", path.display(), version, series);
            None
        }
    })
}

/// Whether `python --version` output names a release in `series`.
fn version_matches(output: &str, series: &str) -> bool {
    let version = output.trim().trim_start_matches("Python").trim();
    version == series
        || version
            .strip_prefix(series)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Where a natively built interpreter of `series` is installed.
pub fn built_interpreter(workspace: &Path, series: &str) -> PathBuf {
    WorkspaceLayout::host(workspace)
        .install()
        .join("bin")
        .join(format!("python{}", series))
}

/// Return a usable host interpreter, building one if none is installed.
///
/// `archive` is the product's source archive; the native build uses the
/// same sources as the cross build.
pub fn ensure_host_python(
    workspace: &Path,
    series: &str,
    archive: &Path,
    jobs: usize,
) -> Result<PathBuf, BuildError> {
    if let Some(path) = find_host_python(series) {
        tracing::info!("Using host Python {}", path.display());
        return Ok(path);
    }

    tracing::info!("No host Python {} found, building one", series);
    build_host_python(workspace, series, archive, jobs)
}

/// Build the host interpreter natively under `workspace/host`.
pub fn build_host_python(
    workspace: &Path,
    series: &str,
    archive: &Path,
    jobs: usize,
) -> Result<PathBuf, BuildError> {
    let layout = WorkspaceLayout::host(workspace);
    let markers = MarkerCache::new(layout.markers());
    let toolchain = ToolchainDescriptor::native(layout.staging());
    let prefix = layout.install();
    let interpreter = built_interpreter(workspace, series);

    // A matching marker is worthless once the install is gone.
    if markers.is_built(HOST_COMPONENT) && !is_executable(&interpreter) {
        markers
            .clear_marker(HOST_COMPONENT)
            .map_err(BuildError::io("failed to clear host interpreter marker"))?;
    }

    let driver = ComponentDriver::new(&toolchain, &markers, &prefix, jobs);
    let outcome = driver.build_component(
        HOST_COMPONENT,
        archive,
        &layout.src_dir(HOST_COMPONENT),
        &Python::new(None),
        &[],
    )?;

    if !is_executable(&interpreter) {
        return Err(BuildError::BuildPythonNotExecutable { path: interpreter });
    }

    if outcome == BuildOutcome::Built {
        tracing::info!("Built host Python at {}", interpreter.display());
    }
    Ok(interpreter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_series() {
        assert!(version_matches("Python 3.11.10", "3.11"));
        assert!(version_matches("Python 3.11.0rc1\n", "3.11"));
        assert!(version_matches("Python 3.11", "3.11"));
    }

    #[test]
    fn test_version_rejects_other_series() {
        assert!(!version_matches("Python 3.12.1", "3.11"));
        assert!(!version_matches("Python 3.110.0", "3.11"));
        assert!(!version_matches("Python 2.7.18", "3.11"));
    }

    #[test]
    fn test_built_interpreter_location() {
        let path = built_interpreter(Path::new("/ws"), "3.11");
        assert_eq!(path, Path::new("/ws/host/install/bin/python3.11"));
    }
}

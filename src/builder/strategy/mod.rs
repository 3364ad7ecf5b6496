//! Build strategies.
//!
//! A strategy knows how to turn an extracted source tree into installed
//! headers and libraries under a prefix. Each one runs its steps with the
//! resolved toolchain environment and reports the first failing step.

mod autotools;
mod bzip2;
mod cmake;
mod openssl;
mod python;

use std::path::Path;

pub use autotools::Autotools;
pub use bzip2::Bzip2;
pub use cmake::CMake;
pub use openssl::OpenSsl;
pub use python::Python;

use crate::builder::driver::BuildError;
use crate::builder::toolchain::ToolchainDescriptor;
use crate::core::StrategyKind;
use crate::util::process::{output_tail, ProcessBuilder};

/// Lines of captured output kept in a failed step's error.
const FAILURE_TAIL_LINES: usize = 20;

/// Everything a strategy needs besides the source tree.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub toolchain: &'a ToolchainDescriptor,
    /// Install prefix for this build.
    pub prefix: &'a Path,
    pub jobs: usize,
}

/// One way of configuring, building and installing a component.
pub trait BuildStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Additional key/value pairs that distinguish one build of this
    /// strategy from another and so belong in the fingerprint.
    fn fingerprint_extras(&self, _toolchain: &ToolchainDescriptor) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Build `component` from `src_dir` and install it into `ctx.prefix`.
    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError>;
}

/// The strategy for a recipe's [`StrategyKind`].
///
/// `build_python` is only used by [`StrategyKind::Python`] when cross
/// compiling.
pub fn strategy_for(kind: StrategyKind, build_python: Option<&Path>) -> Box<dyn BuildStrategy> {
    match kind {
        StrategyKind::TwoPhase => Box::new(Autotools),
        StrategyKind::OutOfTree => Box::new(CMake),
        StrategyKind::Bzip2 => Box::new(Bzip2),
        StrategyKind::OpenSsl => Box::new(OpenSsl),
        StrategyKind::Python => Box::new(Python::new(build_python.map(Path::to_path_buf))),
    }
}

/// A command running in `cwd` with the toolchain environment applied.
pub(crate) fn toolchain_command(
    ctx: &StrategyContext<'_>,
    program: impl AsRef<Path>,
    cwd: &Path,
) -> ProcessBuilder {
    ProcessBuilder::new(program)
        .cwd(cwd)
        .envs(ctx.toolchain.env())
}

/// Run one step of a component build, mapping a non-zero exit to
/// [`BuildError::CommandFailed`].
pub(crate) fn run_step(
    component: &str,
    step: &'static str,
    cmd: &ProcessBuilder,
) -> Result<(), BuildError> {
    tracing::debug!("{}: {}", component, step);

    let output = cmd.exec().map_err(|source| BuildError::Spawn {
        component: component.to_string(),
        command: cmd.display_command(),
        source,
    })?;

    if output.status.success() {
        return Ok(());
    }

    let mut tail = output_tail(&output.stderr, FAILURE_TAIL_LINES);
    if tail.trim().is_empty() {
        tail = output_tail(&output.stdout, FAILURE_TAIL_LINES);
    }

    Err(BuildError::CommandFailed {
        component: component.to_string(),
        step,
        command: cmd.display_command(),
        status: output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        output: tail,
    })
}

/// Fail early with [`BuildError::SourceMissing`] for an absent tree.
pub(crate) fn require_source(component: &str, src_dir: &Path) -> Result<(), BuildError> {
    if src_dir.is_dir() {
        Ok(())
    } else {
        Err(BuildError::SourceMissing {
            component: component.to_string(),
            path: src_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strategy_for_maps_every_kind() {
        let cases = [
            (StrategyKind::TwoPhase, "autotools"),
            (StrategyKind::OutOfTree, "cmake"),
            (StrategyKind::Bzip2, "bzip2"),
            (StrategyKind::OpenSsl, "openssl"),
            (StrategyKind::Python, "python"),
        ];
        for (kind, name) in cases {
            assert_eq!(strategy_for(kind, None).name(), name);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_step_reports_failing_command() {
        let tmp = TempDir::new().unwrap();
        let cmd = ProcessBuilder::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .cwd(tmp.path());

        let err = run_step("zlib", "configure", &cmd).unwrap_err();
        match err {
            BuildError::CommandFailed {
                component,
                step,
                status,
                output,
                ..
            } => {
                assert_eq!(component, "zlib");
                assert_eq!(step, "configure");
                assert_eq!(status, "3");
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_run_step_spawn_failure() {
        let tmp = TempDir::new().unwrap();
        let cmd = ProcessBuilder::new(tmp.path().join("no-such-tool"));
        assert!(matches!(
            run_step("zlib", "build", &cmd),
            Err(BuildError::Spawn { .. })
        ));
    }

    #[test]
    fn test_require_source() {
        let tmp = TempDir::new().unwrap();
        assert!(require_source("x", tmp.path()).is_ok());
        assert!(matches!(
            require_source("x", &tmp.path().join("gone")),
            Err(BuildError::SourceMissing { .. })
        ));
    }
}

//! Two-phase autotools builds: `configure`, then `make install`.

use std::path::Path;

use super::{require_source, run_step, toolchain_command, BuildStrategy, StrategyContext};
use crate::builder::driver::BuildError;

/// `./configure --host=... --prefix=...` followed by `make -jN install`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autotools;

impl BuildStrategy for Autotools {
    fn name(&self) -> &'static str {
        "autotools"
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        require_source(component, src_dir)?;
        ensure_configure(ctx, component, src_dir)?;

        let configure = toolchain_command(ctx, "sh", src_dir)
            .arg("./configure")
            .args(configure_args(ctx, extra_args));
        run_step(component, "configure", &configure)?;

        let install = toolchain_command(ctx, "make", src_dir)
            .arg(format!("-j{}", ctx.jobs))
            .arg("install");
        run_step(component, "install", &install)
    }
}

/// Standard `configure` arguments followed by `extra_args`.
pub(crate) fn configure_args(ctx: &StrategyContext<'_>, extra_args: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(host) = ctx.toolchain.host_flag() {
        args.push(host);
        args.push(ctx.toolchain.build_flag());
    }
    args.push(format!("--prefix={}", ctx.prefix.display()));
    args.extend(extra_args.iter().cloned());
    args
}

/// Generate `configure` for trees that ship only `configure.ac`.
///
/// Tries the project's own `autogen.sh` first, then `autoreconf -fi`.
pub(crate) fn ensure_configure(
    ctx: &StrategyContext<'_>,
    component: &str,
    src_dir: &Path,
) -> Result<(), BuildError> {
    let configure = src_dir.join("configure");
    if configure.is_file() {
        return Ok(());
    }

    tracing::info!("Bootstrapping {} (no configure script)", component);

    if src_dir.join("autogen.sh").is_file() {
        let autogen = toolchain_command(ctx, "sh", src_dir).arg("autogen.sh");
        if let Err(e) = run_step(component, "bootstrap", &autogen) {
            tracing::debug!("autogen.sh failed: {}", e);
        }
        if configure.is_file() {
            return Ok(());
        }
    }

    let autoreconf = toolchain_command(ctx, "autoreconf", src_dir).arg("-fi");
    if let Err(e) = run_step(component, "bootstrap", &autoreconf) {
        tracing::debug!("autoreconf failed: {}", e);
    }

    if configure.is_file() {
        Ok(())
    } else {
        Err(BuildError::BootstrapFailed {
            component: component.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::ToolchainDescriptor;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_native_configure_args_have_no_host() {
        let tc = ToolchainDescriptor::native("/ws/host/staging");
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: Path::new("/ws/host/install"),
            jobs: 4,
        };

        let args = configure_args(&ctx, &["--without-ensurepip".to_string()]);
        assert_eq!(args, ["--prefix=/ws/host/install", "--without-ensurepip"]);
    }

    #[test]
    fn test_missing_source_dir() {
        let tmp = TempDir::new().unwrap();
        let tc = ToolchainDescriptor::native(tmp.path());
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: tmp.path(),
            jobs: 1,
        };

        let err = Autotools
            .build(&ctx, "xz", &tmp.path().join("missing"), &[])
            .unwrap_err();
        assert!(matches!(err, BuildError::SourceMissing { .. }));
    }

    #[test]
    fn test_unbootstrappable_tree_fails() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let tc = ToolchainDescriptor::native(tmp.path());
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: tmp.path(),
            jobs: 1,
        };

        let err = Autotools.build(&ctx, "libffi", &src, &[]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::BootstrapFailed { ref component } if component == "libffi"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_configure_failure_names_the_step() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("configure"),
            "#!/bin/sh\necho \"configure: error: C compiler cannot create executables\" >&2\nexit 77\n",
        )
        .unwrap();

        let tc = ToolchainDescriptor::native(tmp.path());
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: tmp.path(),
            jobs: 1,
        };

        let err = Autotools.build(&ctx, "sqlite", &src, &[]).unwrap_err();
        match err {
            BuildError::CommandFailed {
                step, status, output, ..
            } => {
                assert_eq!(step, "configure");
                assert_eq!(status, "77");
                assert!(output.contains("cannot create executables"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_autogen_bootstraps_configure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("autogen.sh"),
            "#!/bin/sh\nprintf '#!/bin/sh\\nexit 0\\n' > configure\n",
        )
        .unwrap();

        let tc = ToolchainDescriptor::native(tmp.path());
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: tmp.path(),
            jobs: 1,
        };

        ensure_configure(&ctx, "libffi", &src).unwrap();
        assert!(src.join("configure").is_file());
    }
}

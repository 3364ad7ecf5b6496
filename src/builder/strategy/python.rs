//! The CPython interpreter itself.
//!
//! Cross builds need a native interpreter of the same `major.minor` to run
//! the build's own code generation; native builds (the helper itself) do
//! not.

use std::path::{Path, PathBuf};

use super::autotools::{configure_args, ensure_configure};
use super::{require_source, run_step, toolchain_command, BuildStrategy, StrategyContext};
use crate::builder::driver::BuildError;
use crate::util::fs::is_executable;

/// Cache answers `configure` cannot probe on a foreign target.
const CROSS_CACHE_VARS: &[&str] = &[
    "ac_cv_file__dev_ptmx=yes",
    "ac_cv_file__dev_ptc=no",
    "ac_cv_buggy_getaddrinfo=no",
];

#[derive(Debug, Clone, Default)]
pub struct Python {
    build_python: Option<PathBuf>,
}

impl Python {
    pub fn new(build_python: Option<PathBuf>) -> Self {
        Python { build_python }
    }

    fn args(
        &self,
        ctx: &StrategyContext<'_>,
        extra_args: &[String],
    ) -> Result<Vec<String>, BuildError> {
        let mut extra = vec!["--without-ensurepip".to_string()];

        if ctx.toolchain.is_cross() {
            let build_python = self
                .build_python
                .as_ref()
                .ok_or(BuildError::NoBuildPython)?;
            if !is_executable(build_python) {
                return Err(BuildError::BuildPythonNotExecutable {
                    path: build_python.clone(),
                });
            }

            extra.push(format!("--with-build-python={}", build_python.display()));
            extra.push("--enable-shared".to_string());
            extra.push(format!(
                "--with-openssl={}",
                ctx.toolchain.staging().display()
            ));
            extra.extend(CROSS_CACHE_VARS.iter().map(|v| v.to_string()));
        }

        extra.extend(extra_args.iter().cloned());
        Ok(configure_args(ctx, &extra))
    }
}

impl BuildStrategy for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        require_source(component, src_dir)?;
        let args = self.args(ctx, extra_args)?;
        ensure_configure(ctx, component, src_dir)?;

        let configure = toolchain_command(ctx, "sh", src_dir)
            .arg("./configure")
            .args(&args);
        run_step(component, "configure", &configure)?;

        let build = toolchain_command(ctx, "make", src_dir).arg(format!("-j{}", ctx.jobs));
        run_step(component, "build", &build)?;

        let install = toolchain_command(ctx, "make", src_dir).arg("install");
        run_step(component, "install", &install)
    }
}

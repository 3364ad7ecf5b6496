//! bzip2 ships a plain Makefile with no configure step and no way to
//! install only the library, so the static library and header are built
//! directly and copied into the prefix.

use std::fs;
use std::path::Path;

use super::{require_source, run_step, toolchain_command, BuildStrategy, StrategyContext};
use crate::builder::driver::BuildError;
use crate::util::fs::ensure_dir;

const LIBRARY: &str = "libbz2.a";
const HEADER: &str = "bzlib.h";

#[derive(Debug, Clone, Copy, Default)]
pub struct Bzip2;

impl BuildStrategy for Bzip2 {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        require_source(component, src_dir)?;

        let tc = ctx.toolchain;
        let cflags = format!("{} {} -D_FILE_OFFSET_BITS=64", tc.cflags(), tc.cppflags());

        let make = toolchain_command(ctx, "make", src_dir)
            .arg(format!("-j{}", ctx.jobs))
            .arg(LIBRARY)
            .arg(format!("CC={}", tc.cc()))
            .arg(format!("AR={}", tc.ar()))
            .arg(format!("RANLIB={}", tc.ranlib()))
            .arg(format!("CFLAGS={}", cflags.trim()))
            .args(extra_args);
        run_step(component, "build", &make)?;

        install_artifacts(src_dir, ctx.prefix)
    }
}

/// Copy the built library and its header into `prefix`.
pub(crate) fn install_artifacts(src_dir: &Path, prefix: &Path) -> Result<(), BuildError> {
    let lib_dir = prefix.join("lib");
    let include_dir = prefix.join("include");

    for dir in [&lib_dir, &include_dir] {
        ensure_dir(dir).map_err(BuildError::io(format!(
            "failed to create {}",
            dir.display()
        )))?;
    }

    for (file, dest_dir) in [(LIBRARY, &lib_dir), (HEADER, &include_dir)] {
        let from = src_dir.join(file);
        let to = dest_dir.join(file);
        fs::copy(&from, &to).map_err(BuildError::io(format!(
            "failed to install {} to {}",
            from.display(),
            to.display()
        )))?;
    }

    Ok(())
}

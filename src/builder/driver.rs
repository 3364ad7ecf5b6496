//! Building one component with marker-based skipping.
//!
//! For every component the driver computes a fingerprint, skips the build
//! when the stored marker matches, and otherwise runs
//! reset, extract, strategy and mark, in that order. The marker is the last
//! thing written, so a failure at any earlier point leaves the component
//! unbuilt.

use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::builder::fingerprint::Fingerprint;
use crate::builder::marker::MarkerCache;
use crate::builder::strategy::{BuildStrategy, StrategyContext};
use crate::builder::toolchain::ToolchainDescriptor;
use crate::sources::{extract, ArchiveError};
use crate::util::fs::reset_dir;

/// A component failed to build.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("source tree for `{component}` not found at {}", path.display())]
    #[diagnostic(code(crossport::build::source_missing))]
    SourceMissing { component: String, path: PathBuf },

    #[error("`{component}` has no configure script and could not be bootstrapped")]
    #[diagnostic(
        code(crossport::build::bootstrap),
        help("install autoconf, automake and libtool, or use a release tarball")
    )]
    BootstrapFailed { component: String },

    #[error("{step} step of `{component}` failed (exit status {status})\n  command: {command}\n{output}")]
    #[diagnostic(code(crossport::build::command_failed))]
    CommandFailed {
        component: String,
        step: &'static str,
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to run `{command}` for `{component}`")]
    #[diagnostic(code(crossport::build::spawn))]
    Spawn {
        component: String,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{tool}` is required to build `{component}` but was not found")]
    #[diagnostic(
        code(crossport::build::tool_missing),
        help("install {tool} and make sure it is on PATH")
    )]
    ToolMissing { component: String, tool: String },

    #[error("cross-compiling the interpreter requires a host interpreter")]
    #[diagnostic(code(crossport::build::build_python))]
    NoBuildPython,

    #[error("host interpreter {} is missing or not executable", path.display())]
    #[diagnostic(code(crossport::build::build_python))]
    BuildPythonNotExecutable { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error("{context}")]
    #[diagnostic(code(crossport::build::io))]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> BuildError {
        let context = context.into();
        move |source| BuildError::Io { context, source }
    }
}

/// What [`ComponentDriver::build_component`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The marker matched; nothing ran.
    Skipped,
    Built,
}

/// Builds components for one toolchain into one prefix.
pub struct ComponentDriver<'a> {
    toolchain: &'a ToolchainDescriptor,
    markers: &'a MarkerCache,
    prefix: &'a Path,
    jobs: usize,
}

impl<'a> ComponentDriver<'a> {
    pub fn new(
        toolchain: &'a ToolchainDescriptor,
        markers: &'a MarkerCache,
        prefix: &'a Path,
        jobs: usize,
    ) -> Self {
        ComponentDriver {
            toolchain,
            markers,
            prefix,
            jobs,
        }
    }

    fn context(&self) -> StrategyContext<'a> {
        StrategyContext {
            toolchain: self.toolchain,
            prefix: self.prefix,
            jobs: self.jobs,
        }
    }

    /// The fingerprint `component` would be built with.
    pub fn fingerprint(
        &self,
        archive: &Path,
        strategy: &dyn BuildStrategy,
    ) -> Result<Fingerprint, BuildError> {
        let fingerprint = Fingerprint::for_archive(archive, self.toolchain).map_err(
            BuildError::io(format!("failed to hash {}", archive.display())),
        )?;

        Ok(strategy
            .fingerprint_extras(self.toolchain)
            .into_iter()
            .fold(fingerprint, |fp, (key, value)| fp.with_extra(key, value)))
    }

    /// Build `component` unless its marker already matches.
    pub fn build_component(
        &self,
        component: &str,
        archive: &Path,
        src_dir: &Path,
        strategy: &dyn BuildStrategy,
        extra_args: &[String],
    ) -> Result<BuildOutcome, BuildError> {
        let fingerprint = self.fingerprint(archive, strategy)?.canonical();

        if self.markers.is_built_match(component, &fingerprint) {
            tracing::info!("Skipping {} (up to date)", component);
            return Ok(BuildOutcome::Skipped);
        }

        if self.markers.is_built(component) {
            tracing::info!("{} inputs changed, rebuilding", component);
            self.markers
                .clear_marker(component)
                .map_err(BuildError::io(format!(
                    "failed to clear marker for {}",
                    component
                )))?;
        }

        tracing::info!("Building {} ({})", component, strategy.name());
        self.build_fresh(component, archive, src_dir, strategy, extra_args)?;

        self.markers
            .mark_built(component, &fingerprint)
            .map_err(BuildError::io(format!(
                "failed to write marker for {}",
                component
            )))?;

        Ok(BuildOutcome::Built)
    }

    /// Build `component` from a clean source tree, without consulting or
    /// writing markers.
    pub fn build_fresh(
        &self,
        component: &str,
        archive: &Path,
        src_dir: &Path,
        strategy: &dyn BuildStrategy,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        reset_dir(src_dir).map_err(BuildError::io(format!(
            "failed to clear {}",
            src_dir.display()
        )))?;
        extract(archive, src_dir, component)?;

        strategy.build(&self.context(), component, src_dir, extra_args)
    }
}

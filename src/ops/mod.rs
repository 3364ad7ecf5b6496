//! High-level operations.
//!
//! This module contains the implementation of Crossport commands.

pub mod host_python;
pub mod package;
pub mod pipeline;
pub mod preflight;

pub use host_python::{ensure_host_python, find_host_python};
pub use package::{archive_stem, package_output, BuildInfo};
pub use pipeline::{ndk_locator, Pipeline, PipelineError, PipelineReport};
pub use preflight::{check_host_tools, format_report, CheckResult, PreflightReport};

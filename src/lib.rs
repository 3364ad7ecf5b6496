//! Crossport - cross-compiles Python and its native dependencies for Android
//!
//! This crate provides the library behind the `crossport` command:
//! toolchain resolution against the Android NDK, fingerprinted build
//! markers, per-component build strategies and the build pipeline.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities and mocks for Crossport unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording fetcher, a counting build
/// strategy and archive and NDK fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{Arch, BuildConfig, WorkspaceLayout};
pub use ops::{Pipeline, PipelineError};
pub use util::context::GlobalContext;

//! Component builds.
//!
//! A component goes from source archive to installed files through the
//! [`ComponentDriver`], which consults the [`MarkerCache`] and hands the
//! actual configure, build and install steps to a [`BuildStrategy`].

pub mod driver;
pub mod fingerprint;
pub mod marker;
pub mod strategy;
pub mod toolchain;

pub use driver::{BuildError, BuildOutcome, ComponentDriver};
pub use fingerprint::Fingerprint;
pub use marker::MarkerCache;
pub use strategy::{strategy_for, BuildStrategy, StrategyContext};
pub use toolchain::{EnvOverrides, Ndk, NdkLocator, ToolchainDescriptor, ToolchainError};

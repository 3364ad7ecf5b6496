//! Core data model: architectures, build configuration, workspace layout
//! and component recipes.

pub mod arch;
pub mod config;
pub mod layout;
pub mod recipe;

pub use arch::{Arch, UnknownArch};
pub use config::{BuildConfig, ConfigError};
pub use layout::WorkspaceLayout;
pub use recipe::{ComponentRecipe, Recipes, SourceOverride, StrategyKind};

//! Shared utilities

pub mod config;
pub mod context;
pub mod fs;
pub mod hash;
pub mod process;

pub use config::Settings;
pub use context::GlobalContext;

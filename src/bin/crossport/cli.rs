//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Crossport - cross-compile Python and its native dependencies for Android
#[derive(Parser)]
#[command(name = "crossport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every component and package the result
    Build(BuildArgs),

    /// Download source archives without building
    Fetch(FetchArgs),

    /// Show the resolved cross toolchain
    Toolchain(ToolchainArgs),

    /// Inspect or clear build markers
    Markers(MarkersArgs),

    /// Check that the host has everything a build needs
    Doctor(DoctorArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options selecting the target and workspace, shared by most commands.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target architecture (aarch64, armv7a, x86_64, i686)
    #[arg(long)]
    pub arch: Option<String>,

    /// Minimum Android API level
    #[arg(long = "api", value_name = "LEVEL")]
    pub api_level: Option<u32>,

    /// Number of parallel jobs per component
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Workspace directory
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Use the Android NDK installed at this path
    #[arg(long, value_name = "DIR")]
    pub ndk: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Do not strip shared objects in the output
    #[arg(long)]
    pub no_strip: bool,
}

#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args)]
pub struct ToolchainArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Download the NDK if it is not installed
    #[arg(long)]
    pub download: bool,

    /// Print shell `export` lines instead of a table
    #[arg(long)]
    pub env: bool,
}

#[derive(Args)]
pub struct MarkersArgs {
    #[command(subcommand)]
    pub command: MarkersCommands,
}

#[derive(Subcommand)]
pub enum MarkersCommands {
    /// List built components and their fingerprints
    List(MarkersListArgs),

    /// Clear markers so components are rebuilt
    Clear(MarkersClearArgs),
}

#[derive(Args)]
pub struct MarkersListArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Use the host interpreter build's markers
    #[arg(long)]
    pub host: bool,
}

#[derive(Args)]
pub struct MarkersClearArgs {
    /// Component to clear (all components when omitted)
    pub component: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Use the host interpreter build's markers
    #[arg(long)]
    pub host: bool,
}

#[derive(Args)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Remove the whole workspace, including downloads and the NDK
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod doctor;
pub mod fetch;
pub mod markers;
pub mod toolchain;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::TargetArgs;
use crossport::core::{BuildConfig, WorkspaceLayout};
use crossport::ops::{Pipeline, PipelineError};
use crossport::sources::Fetcher;
use crossport::util::{GlobalContext, Settings};

/// Configuration for one command: config files with flags applied.
pub struct Session {
    pub ctx: GlobalContext,
    pub settings: Settings,
    /// NDK to prefer: `--ndk`, then the environment, then `[ndk] home`.
    pub ndk_home: Option<PathBuf>,
}

impl Session {
    pub fn load(args: &TargetArgs) -> Result<Self> {
        let ctx = GlobalContext::new()?;
        let mut settings = ctx.load_settings()?;

        // CLI flags override config files
        if let Some(ref arch) = args.arch {
            settings.build.arch = Some(arch.clone());
        }
        if let Some(api_level) = args.api_level {
            settings.build.api_level = Some(api_level);
        }
        if let Some(jobs) = args.jobs {
            settings.build.jobs = Some(jobs);
        }
        if let Some(ref workspace) = args.workspace {
            settings.build.workspace = Some(workspace.clone());
        }
        let workspace = ctx.resolve_path(&settings.build.workspace());
        settings.build.workspace = Some(workspace);

        let ndk_home = args
            .ndk
            .clone()
            .or_else(|| ctx.ndk_home().map(|p| p.to_path_buf()))
            .or_else(|| settings.ndk.home.clone())
            .map(|p| ctx.resolve_path(&p));

        Ok(Session {
            ctx,
            settings,
            ndk_home,
        })
    }

    /// The validated build configuration.
    pub fn build_config(&self) -> Result<BuildConfig, PipelineError> {
        let build = &self.settings.build;
        Ok(BuildConfig::new(
            build.arch(),
            build.api_level(),
            build.jobs(),
            build.workspace(),
        )?)
    }

    pub fn layout(&self) -> Result<WorkspaceLayout, PipelineError> {
        self.build_config().map(|c| WorkspaceLayout::for_config(&c))
    }

    pub fn pipeline<'a>(&self, fetcher: &'a dyn Fetcher) -> Result<Pipeline<'a>, PipelineError> {
        Pipeline::new(
            &self.settings,
            self.ctx.env_overrides().clone(),
            self.ndk_home.clone(),
            fetcher,
        )
    }
}

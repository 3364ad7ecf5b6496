//! The end-to-end build: sources to distribution archive.
//!
//! Phases run strictly in order and the first error stops the run. Nothing
//! is rolled back; a rerun skips every component whose marker still
//! matches and resumes at the one that failed.
//!
//! 1. validate the configuration (before anything touches disk)
//! 2. check host tools
//! 3. fetch every source archive
//! 4. find or build the host interpreter
//! 5. locate the NDK and resolve the toolchain
//! 6. build dependencies in declared order
//! 7. build the product from scratch into the output directory
//! 8. strip, write `env.sh` and `build-info.json`
//! 9. package the output directory

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::builder::driver::{BuildError, BuildOutcome, ComponentDriver};
use crate::builder::marker::MarkerCache;
use crate::builder::strategy::{strategy_for, Python};
use crate::builder::toolchain::{
    EnvOverrides, Ndk, NdkLocator, ToolchainDescriptor, ToolchainError,
};
use crate::core::{BuildConfig, ConfigError, Recipes, WorkspaceLayout};
use crate::ops::host_python::ensure_host_python;
use crate::ops::package::{
    archive_stem, package_output, strip_shared_objects, write_build_info, write_env_script,
    BuildInfo,
};
use crate::ops::preflight::check_host_tools;
use crate::sources::{fetch_source, ArchiveError, FetchError, Fetcher};
use crate::util::config::{PackageSettings, Settings};
use crate::util::fs::{is_executable, reset_dir};

/// A pipeline run stopped.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("required host tools are missing: {}", tools.join(", "))]
    #[diagnostic(
        code(crossport::pipeline::host_tools),
        help("run `crossport doctor` for details")
    )]
    MissingHostTools { tools: Vec<String> },

    #[error("failed to fetch `{component}`")]
    #[diagnostic(code(crossport::pipeline::fetch))]
    Fetch {
        component: String,
        #[source]
        source: FetchError,
    },

    #[error("no usable host interpreter")]
    #[diagnostic(
        code(crossport::pipeline::host_python),
        help("install a matching python on PATH, or fix the host build")
    )]
    HostPython(#[source] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("failed to build `{component}`")]
    #[diagnostic(
        code(crossport::pipeline::component),
        help("fix the error and rerun; components already built are skipped")
    )]
    Component {
        component: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to build `{component}`")]
    #[diagnostic(code(crossport::pipeline::final_build))]
    FinalBuild {
        component: String,
        #[source]
        source: BuildError,
    },

    #[error("{context}")]
    #[diagnostic(code(crossport::pipeline::package))]
    Package {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    #[diagnostic(code(crossport::pipeline::io))]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Whether the error reflects a broken environment rather than a
    /// failed step that a rerun could get past.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Config(_)
            | PipelineError::MissingHostTools { .. }
            | PipelineError::HostPython(_)
            | PipelineError::Toolchain(_)
            | PipelineError::Io { .. } => true,
            PipelineError::Component { source, .. } | PipelineError::FinalBuild { source, .. } => {
                matches!(
                    source,
                    BuildError::Archive(ArchiveError::UnsupportedFormat { .. })
                        | BuildError::NoBuildPython
                        | BuildError::BuildPythonNotExecutable { .. }
                )
            }
            PipelineError::Fetch { .. } | PipelineError::Package { .. } => false,
        }
    }
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> PipelineError {
    let context = context.into();
    move |source| PipelineError::Io { context, source }
}

fn package_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> PipelineError {
    let context = context.into();
    move |source| PipelineError::Package { context, source }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub archive: PathBuf,
    pub host_python: PathBuf,
    /// Dependencies built this run, in build order.
    pub built: Vec<String>,
    /// Dependencies skipped because their marker matched.
    pub skipped: Vec<String>,
}

/// A configured build of one target.
pub struct Pipeline<'a> {
    config: BuildConfig,
    layout: WorkspaceLayout,
    recipes: Recipes,
    ndk: NdkLocator,
    overrides: EnvOverrides,
    package: PackageSettings,
    fetcher: &'a dyn Fetcher,
}

impl<'a> Pipeline<'a> {
    /// Validate `settings` and prepare a run.
    ///
    /// `env` is the environment snapshot; it takes precedence over the
    /// `[toolchain]` table. `ndk_home` is an installed NDK to prefer over
    /// downloading one. Nothing is read from or written to disk here.
    pub fn new(
        settings: &Settings,
        env: EnvOverrides,
        ndk_home: Option<PathBuf>,
        fetcher: &'a dyn Fetcher,
    ) -> Result<Self, PipelineError> {
        let config = BuildConfig::new(
            settings.build.arch(),
            settings.build.api_level(),
            settings.build.jobs(),
            settings.build.workspace(),
        )?;
        let layout = WorkspaceLayout::for_config(&config);
        let ndk = ndk_locator(settings, &layout, ndk_home);

        Ok(Pipeline {
            config,
            layout,
            recipes: Recipes::with_overrides(&settings.sources),
            ndk,
            overrides: env.over(settings.toolchain.overrides()),
            package: settings.package.clone(),
            fetcher,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn recipes(&self) -> &Recipes {
        &self.recipes
    }

    /// Run every phase and package the result.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        tracing::info!(
            "Building {} {} for {}",
            self.recipes.product.name,
            self.recipes.product.version,
            self.config.target_name()
        );

        self.preflight()?;
        let archives = self.fetch_all()?;
        let product_archive = archive_for(&archives, &self.recipes.product.name)?;

        tracing::info!("Resolving host interpreter");
        let host_python = ensure_host_python(
            self.config.workspace(),
            &self.recipes.product_series(),
            product_archive,
            self.config.jobs(),
        )
        .map_err(PipelineError::HostPython)?;

        let (ndk, toolchain) = self.resolve_toolchain()?;

        self.layout
            .create_all()
            .map_err(io_err("failed to create workspace directories"))?;
        let markers = MarkerCache::new(self.layout.markers());
        let staging = self.layout.staging();

        let (built, skipped) = self.build_dependencies(&archives, &toolchain, &markers, &staging)?;
        let product_fingerprint =
            self.build_product(product_archive, &host_python, &toolchain, &markers)?;

        self.post_build(&ndk, &toolchain, &markers, product_fingerprint)?;

        let stem = archive_stem(
            self.package
                .name
                .as_deref()
                .unwrap_or(&self.recipes.product.name),
            &self.recipes.product.version,
            self.config.target_triple(),
            self.config.api_level(),
        );
        let archive = package_output(&self.layout.output(), &self.layout.dist(), &stem)
            .map_err(package_err("failed to package output"))?;

        Ok(PipelineReport {
            archive,
            host_python,
            built,
            skipped,
        })
    }

    /// Fail with [`PipelineError::MissingHostTools`] unless every required
    /// host tool is installed.
    pub fn preflight(&self) -> Result<(), PipelineError> {
        let report = check_host_tools();
        if report.all_required_passed() {
            return Ok(());
        }
        Err(PipelineError::MissingHostTools {
            tools: report.missing_required(),
        })
    }

    /// Download every source archive not already present.
    ///
    /// Returns `(component, archive)` pairs, product last.
    pub fn fetch_all(&self) -> Result<Vec<(String, PathBuf)>, PipelineError> {
        let downloads = self.layout.downloads();

        self.recipes
            .all()
            .map(|recipe| {
                fetch_source(
                    self.fetcher,
                    &recipe.url,
                    &downloads,
                    recipe.sha256.as_deref(),
                )
                .map(|path| (recipe.name.clone(), path))
                .map_err(|source| PipelineError::Fetch {
                    component: recipe.name.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Locate (or download) the NDK and derive the cross toolchain.
    pub fn resolve_toolchain(&self) -> Result<(Ndk, ToolchainDescriptor), PipelineError> {
        let ndk = self.ndk.ensure(self.fetcher)?;
        let toolchain = ndk.setup(&self.config, &self.overrides, &self.layout.staging())?;
        Ok((ndk, toolchain))
    }

    /// Resolve the toolchain from an NDK that is already installed.
    pub fn locate_toolchain(&self) -> Result<(Ndk, ToolchainDescriptor), PipelineError> {
        let ndk = self.ndk.locate().ok_or_else(|| ToolchainError::NdkNotFound {
            path: self.ndk.local_path(),
        })?;
        let toolchain = ndk.setup(&self.config, &self.overrides, &self.layout.staging())?;
        Ok((ndk, toolchain))
    }

    fn build_dependencies(
        &self,
        archives: &[(String, PathBuf)],
        toolchain: &ToolchainDescriptor,
        markers: &MarkerCache,
        staging: &Path,
    ) -> Result<(Vec<String>, Vec<String>), PipelineError> {
        let driver = ComponentDriver::new(toolchain, markers, staging, self.config.jobs());
        let mut built = Vec::new();
        let mut skipped = Vec::new();

        for recipe in &self.recipes.components {
            let archive = archive_for(archives, &recipe.name)?;
            let strategy = strategy_for(recipe.strategy, None);

            let outcome = driver
                .build_component(
                    &recipe.name,
                    archive,
                    &self.layout.src_dir(&recipe.name),
                    strategy.as_ref(),
                    &recipe.extra_args,
                )
                .map_err(|source| PipelineError::Component {
                    component: recipe.name.clone(),
                    source,
                })?;

            match outcome {
                BuildOutcome::Built => built.push(recipe.name.clone()),
                BuildOutcome::Skipped => skipped.push(recipe.name.clone()),
            }
        }

        Ok((built, skipped))
    }

    /// Build the product into a fresh output directory. Returns its
    /// fingerprint for the build record.
    fn build_product(
        &self,
        archive: &Path,
        host_python: &Path,
        toolchain: &ToolchainDescriptor,
        markers: &MarkerCache,
    ) -> Result<String, PipelineError> {
        let product = &self.recipes.product;

        if !is_executable(host_python) {
            return Err(PipelineError::HostPython(
                BuildError::BuildPythonNotExecutable {
                    path: host_python.to_path_buf(),
                },
            ));
        }

        let output = self.layout.output();
        reset_dir(&output).map_err(io_err(format!("failed to clear {}", output.display())))?;

        let strategy = Python::new(Some(host_python.to_path_buf()));
        let driver = ComponentDriver::new(toolchain, markers, &output, self.config.jobs());
        let final_err = |source| PipelineError::FinalBuild {
            component: product.name.clone(),
            source,
        };

        tracing::info!("Building {} {}", product.name, product.version);
        let fingerprint = driver.fingerprint(archive, &strategy).map_err(final_err)?;
        driver
            .build_fresh(
                &product.name,
                archive,
                &self.layout.src_dir(&product.name),
                &strategy,
                &product.extra_args,
            )
            .map_err(final_err)?;

        Ok(fingerprint.canonical())
    }

    fn post_build(
        &self,
        ndk: &Ndk,
        toolchain: &ToolchainDescriptor,
        markers: &MarkerCache,
        product_fingerprint: String,
    ) -> Result<(), PipelineError> {
        let output = self.layout.output();

        if self.package.strip() {
            strip_shared_objects(&output.join("lib"), toolchain.strip());
        }

        if let Err(e) = write_env_script(&output) {
            tracing::warn!("failed to write env.sh: {}", e);
        }

        let mut components: BTreeMap<_, _> = markers
            .list()
            .map_err(io_err("failed to read build markers"))?
            .into_iter()
            .collect();
        components.insert(self.recipes.product.name.clone(), product_fingerprint);

        let info = BuildInfo {
            product: self.recipes.product.name.clone(),
            version: self.recipes.product.version.clone(),
            arch: self.config.arch().to_string(),
            api_level: self.config.api_level(),
            target_triple: self.config.target_triple().to_string(),
            ndk_revision: ndk.revision(),
            components,
        };
        write_build_info(&output, &info).map_err(package_err("failed to write build-info.json"))?;

        Ok(())
    }
}

/// NDK locator honoring `[ndk]` settings, preferring `external`.
pub fn ndk_locator(
    settings: &Settings,
    layout: &WorkspaceLayout,
    external: Option<PathBuf>,
) -> NdkLocator {
    NdkLocator::new(layout.ndk_root(), settings.ndk.version())
        .with_external(external)
        .with_url(settings.ndk.url.clone())
        .with_sha256(settings.ndk.sha256.clone())
}

fn archive_for<'p>(
    archives: &'p [(String, PathBuf)],
    component: &str,
) -> Result<&'p Path, PipelineError> {
    archives
        .iter()
        .find(|(name, _)| name == component)
        .map(|(_, path)| path.as_path())
        .ok_or_else(|| PipelineError::Io {
            context: format!("no source archive fetched for `{}`", component),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
}

//! Component recipes: what to fetch and how to build it.
//!
//! The dependency order below is declared by hand. A component must
//! appear after everything it includes or links against.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Build strategy used for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// `configure` then `make install` (autotools).
    TwoPhase,
    /// Out-of-tree CMake configure, build and install.
    OutOfTree,
    /// bzip2's plain Makefile.
    Bzip2,
    /// OpenSSL's perl `Configure` with an architecture platform id.
    OpenSsl,
    /// The final cross-compiled interpreter.
    Python,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::TwoPhase => "two-phase",
            StrategyKind::OutOfTree => "out-of-tree",
            StrategyKind::Bzip2 => "bzip2",
            StrategyKind::OpenSsl => "openssl",
            StrategyKind::Python => "python",
        };
        f.write_str(s)
    }
}

/// A buildable source component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecipe {
    pub name: String,
    pub version: String,
    /// Download URL, `{version}` already expanded.
    pub url: String,
    /// Expected SHA-256 of the archive, if verification is wanted.
    pub sha256: Option<String>,
    pub strategy: StrategyKind,
    /// Extra arguments handed to the strategy's configure step.
    pub extra_args: Vec<String>,
}

impl ComponentRecipe {
    fn new(name: &str, version: &str, url: &str, strategy: StrategyKind) -> Self {
        ComponentRecipe {
            name: name.to_string(),
            version: version.to_string(),
            url: expand_url(url, version),
            sha256: None,
            strategy,
            extra_args: Vec::new(),
        }
    }

    fn with_args(mut self, args: &[&str]) -> Self {
        self.extra_args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Apply a `[sources.<name>]` override.
    pub fn apply(&mut self, source: &SourceOverride) {
        if let Some(ref version) = source.version {
            self.version = version.clone();
        }
        if let Some(ref url) = source.url {
            self.url = expand_url(url, &self.version);
        } else if source.version.is_some() {
            // Re-derive the default URL for the new version.
            match default_url_template(&self.name) {
                Some(template) => self.url = expand_url(template, &self.version),
                None => tracing::warn!(
                    "[sources.{}] sets a version without a url; still fetching {}",
                    self.name,
                    self.url
                ),
            }
        }
        if source.sha256.is_some() {
            self.sha256 = source.sha256.clone();
        }
        if let Some(ref args) = source.extra_args {
            self.extra_args = args.clone();
        }
    }
}

/// Per-component overrides from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    pub version: Option<String>,
    pub url: Option<String>,
    pub sha256: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

/// The dependency components in build order, plus the final product.
#[derive(Debug, Clone)]
pub struct Recipes {
    pub components: Vec<ComponentRecipe>,
    pub product: ComponentRecipe,
}

const ZLIB_URL: &str = "https://zlib.net/fossils/zlib-{version}.tar.gz";
const BZIP2_URL: &str = "https://sourceware.org/pub/bzip2/bzip2-{version}.tar.gz";
const XZ_URL: &str =
    "https://github.com/tukaani-project/xz/releases/download/v{version}/xz-{version}.tar.gz";
const LIBFFI_URL: &str =
    "https://github.com/libffi/libffi/releases/download/v{version}/libffi-{version}.tar.gz";
const OPENSSL_URL: &str = "https://www.openssl.org/source/openssl-{version}.tar.gz";
// Dated directory: a new version needs an explicit `url`.
const SQLITE_URL: &str = "https://www.sqlite.org/2024/sqlite-autoconf-{version}.tar.gz";
const PYTHON_URL: &str = "https://www.python.org/ftp/python/{version}/Python-{version}.tar.xz";

fn default_url_template(name: &str) -> Option<&'static str> {
    match name {
        "zlib" => Some(ZLIB_URL),
        "bzip2" => Some(BZIP2_URL),
        "xz" => Some(XZ_URL),
        "libffi" => Some(LIBFFI_URL),
        "openssl" => Some(OPENSSL_URL),
        "python" => Some(PYTHON_URL),
        _ => None,
    }
}

fn expand_url(template: &str, version: &str) -> String {
    template.replace("{version}", version)
}

impl Default for Recipes {
    fn default() -> Self {
        let components = vec![
            ComponentRecipe::new("zlib", "1.3.1", ZLIB_URL, StrategyKind::OutOfTree)
                .with_args(&["-DZLIB_BUILD_EXAMPLES=OFF"]),
            ComponentRecipe::new("bzip2", "1.0.8", BZIP2_URL, StrategyKind::Bzip2),
            ComponentRecipe::new("xz", "5.4.6", XZ_URL, StrategyKind::TwoPhase).with_args(&[
                "--disable-shared",
                "--enable-static",
                "--disable-xz",
                "--disable-xzdec",
                "--disable-lzmadec",
                "--disable-lzmainfo",
                "--disable-scripts",
                "--disable-doc",
            ]),
            ComponentRecipe::new("libffi", "3.4.6", LIBFFI_URL, StrategyKind::TwoPhase)
                .with_args(&["--disable-shared", "--enable-static", "--disable-docs"]),
            ComponentRecipe::new("openssl", "3.0.15", OPENSSL_URL, StrategyKind::OpenSsl),
            ComponentRecipe::new("sqlite", "3460100", SQLITE_URL, StrategyKind::TwoPhase)
                .with_args(&["--disable-shared", "--enable-static"]),
        ];

        let product = ComponentRecipe::new("python", "3.11.10", PYTHON_URL, StrategyKind::Python);

        Recipes {
            components,
            product,
        }
    }
}

impl Recipes {
    /// Default recipes with configuration overrides applied.
    ///
    /// Overrides for unknown component names are ignored with a warning.
    pub fn with_overrides(overrides: &BTreeMap<String, SourceOverride>) -> Self {
        let mut recipes = Recipes::default();
        for (name, source) in overrides {
            match recipes.get_mut(name) {
                Some(recipe) => recipe.apply(source),
                None => tracing::warn!("ignoring [sources.{}]: no such component", name),
            }
        }
        recipes
    }

    /// Every recipe, dependencies first and the product last.
    pub fn all(&self) -> impl Iterator<Item = &ComponentRecipe> {
        self.components.iter().chain(std::iter::once(&self.product))
    }

    pub fn get(&self, name: &str) -> Option<&ComponentRecipe> {
        self.all().find(|r| r.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ComponentRecipe> {
        if self.product.name == name {
            return Some(&mut self.product);
        }
        self.components.iter_mut().find(|r| r.name == name)
    }

    /// `major.minor` of the product, e.g. `3.11`.
    pub fn product_series(&self) -> String {
        series(&self.product.version)
    }
}

/// `major.minor` prefix of a dotted version string.
pub fn series(version: &str) -> String {
    match semver::Version::parse(version) {
        Ok(v) => format!("{}.{}", v.major, v.minor),
        Err(_) => version.split('.').take(2).collect::<Vec<_>>().join("."),
    }
}

//! Locating the Android NDK and deriving its toolchain.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::env::{default_layer, resolve, EnvOverrides, Layer};
use super::{TargetKind, ToolchainDescriptor, ToolchainError};
use crate::core::BuildConfig;
use crate::sources::{fetch_and_extract, Fetcher};

/// NDK release used when none is configured.
pub const DEFAULT_NDK_VERSION: &str = "r26d";

/// Official download for `version` on this host, if one exists as a zip.
pub fn ndk_download_url(version: &str) -> Option<String> {
    let platform = match std::env::consts::OS {
        "linux" => "linux",
        "windows" => "windows",
        _ => return None,
    };
    Some(format!(
        "https://dl.google.com/android/repository/android-ndk-{}-{}.zip",
        version, platform
    ))
}

/// Finds an NDK, downloading one into the workspace as a last resort.
#[derive(Debug, Clone)]
pub struct NdkLocator {
    external: Option<PathBuf>,
    local_root: PathBuf,
    version: String,
    url: Option<String>,
    sha256: Option<String>,
}

impl NdkLocator {
    /// Locator that keeps downloaded NDKs under `local_root`.
    pub fn new(local_root: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        let version = version.into();
        NdkLocator {
            external: None,
            local_root: local_root.into(),
            url: ndk_download_url(&version),
            version,
            sha256: None,
        }
    }

    /// An externally installed NDK to prefer when it exists.
    pub fn with_external(mut self, path: Option<PathBuf>) -> Self {
        self.external = path;
        self
    }

    /// Replace the download URL.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.url = url;
        }
        self
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Where a workspace-local NDK of this version lives.
    pub fn local_path(&self) -> PathBuf {
        self.local_root.join(format!("android-ndk-{}", self.version))
    }

    /// Find an NDK without downloading anything.
    pub fn locate(&self) -> Option<Ndk> {
        if let Some(ref external) = self.external {
            if external.is_dir() {
                tracing::debug!("Using NDK at {}", external.display());
                return Some(Ndk::new(external.clone()));
            }
            tracing::warn!(
                "configured NDK {} does not exist, looking elsewhere",
                external.display()
            );
        }

        let local = self.local_path();
        if local.is_dir() {
            tracing::debug!("Using workspace NDK at {}", local.display());
            return Some(Ndk::new(local));
        }

        None
    }

    /// Find an NDK, downloading and extracting it when absent.
    pub fn ensure(&self, fetcher: &dyn Fetcher) -> Result<Ndk, ToolchainError> {
        if let Some(ndk) = self.locate() {
            return Ok(ndk);
        }

        let url = self
            .url
            .as_deref()
            .ok_or_else(|| ToolchainError::HostUnsupported {
                os: std::env::consts::OS.to_string(),
            })?;
        let dest = self.local_path();
        tracing::info!("Downloading Android NDK {}", self.version);

        fetch_and_extract(
            fetcher,
            url,
            &self.local_root,
            &dest,
            "ndk",
            self.sha256.as_deref(),
        )
        .map_err(ToolchainError::NdkFetch)?;

        if !dest.is_dir() {
            return Err(ToolchainError::NdkNotFound { path: dest });
        }
        Ok(Ndk::new(dest))
    }
}

/// An NDK root directory known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ndk {
    root: PathBuf,
}

impl Ndk {
    fn new(root: PathBuf) -> Self {
        Ndk { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `toolchains/llvm/prebuilt/<host_tag>` inside the NDK.
    pub fn toolchain_root(&self, host_tag: &str) -> PathBuf {
        self.root
            .join("toolchains")
            .join("llvm")
            .join("prebuilt")
            .join(host_tag)
    }

    /// `Pkg.Revision` from `source.properties`, if readable.
    pub fn revision(&self) -> Option<String> {
        let text = fs::read_to_string(self.root.join("source.properties")).ok()?;
        text.lines().find_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == "Pkg.Revision").then(|| value.trim().to_string())
        })
    }

    /// Resolve the full cross toolchain for `config`.
    ///
    /// `staging` is the prefix dependencies are installed into; include,
    /// library and pkg-config searches are pointed at it.
    pub fn setup(
        &self,
        config: &BuildConfig,
        overrides: &EnvOverrides,
        staging: &Path,
    ) -> Result<ToolchainDescriptor, ToolchainError> {
        let toolchain_root = self.toolchain_root(config.host_tag());
        if !toolchain_root.is_dir() {
            return Err(ToolchainError::ToolchainMissing {
                path: toolchain_root,
                host_tag: config.host_tag().to_string(),
            });
        }

        let bin_dir = toolchain_root.join("bin");
        let sysroot = toolchain_root.join("sysroot");
        let derived = derived_layer(config, &bin_dir, &sysroot, staging);
        let vars = resolve(overrides, &derived, &default_layer());

        if let Some(cc) = vars.get("CC") {
            let path = PathBuf::from(&cc.value);
            if cc.layer == Layer::Derived && !path.is_file() {
                return Err(ToolchainError::CompilerMissing {
                    path,
                    api_level: config.api_level(),
                });
            }
        }

        tracing::debug!(
            "Toolchain for {} at API {}: {}",
            config.arch(),
            config.api_level(),
            bin_dir.display()
        );

        let target = TargetKind::Cross {
            arch: config.arch(),
            api_level: config.api_level(),
            ndk_root: self.root.clone(),
            sysroot,
            bin_dir,
        };
        Ok(ToolchainDescriptor::cross(target, staging.to_path_buf(), vars))
    }
}

#[cfg(windows)]
const WRAPPER_SUFFIX: &str = ".cmd";
#[cfg(not(windows))]
const WRAPPER_SUFFIX: &str = "";

fn derived_layer(
    config: &BuildConfig,
    bin_dir: &Path,
    sysroot: &Path,
    staging: &Path,
) -> BTreeMap<String, String> {
    let exe = std::env::consts::EXE_SUFFIX;
    let clang = format!("{}{}-clang", config.arch().clang_triple(), config.api_level());
    let tool = |name: String| bin_dir.join(name).display().to_string();

    let cc = tool(format!("{}{}", clang, WRAPPER_SUFFIX));
    let cxx = tool(format!("{}++{}", clang, WRAPPER_SUFFIX));
    let sysroot_flag = format!("--sysroot={}", sysroot.display());
    let cflags = format!("-O2 -fPIC {}", sysroot_flag);

    let mut vars = BTreeMap::new();
    vars.insert("CC".to_string(), cc.clone());
    vars.insert("CXX".to_string(), cxx);
    vars.insert("AS".to_string(), cc);
    vars.insert("AR".to_string(), tool(format!("llvm-ar{}", exe)));
    vars.insert("RANLIB".to_string(), tool(format!("llvm-ranlib{}", exe)));
    vars.insert("LD".to_string(), tool(format!("ld.lld{}", exe)));
    vars.insert("STRIP".to_string(), tool(format!("llvm-strip{}", exe)));
    vars.insert("CFLAGS".to_string(), cflags.clone());
    vars.insert("CXXFLAGS".to_string(), cflags);
    vars.insert(
        "CPPFLAGS".to_string(),
        format!("-I{}", staging.join("include").display()),
    );
    vars.insert(
        "LDFLAGS".to_string(),
        format!("{} -L{}", sysroot_flag, staging.join("lib").display()),
    );
    vars.insert("SYSROOT".to_string(), sysroot.display().to_string());
    vars.insert("PKG_CONFIG_PATH".to_string(), String::new());
    vars.insert(
        "PKG_CONFIG_LIBDIR".to_string(),
        staging.join("lib").join("pkgconfig").display().to_string(),
    );
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_ndk, zip_bytes, RecordingFetcher};
    use tempfile::TempDir;

    fn config(arch: &str, api: u32, ws: &Path) -> BuildConfig {
        BuildConfig::new(arch, api, 2, ws).unwrap()
    }

    #[test]
    fn test_setup_derives_tool_paths() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("aarch64", 24, tmp.path());
        let ndk_root = fake_ndk(tmp.path(), &cfg);
        let staging = tmp.path().join("staging");

        let ndk = NdkLocator::new(tmp.path().join("ndk"), DEFAULT_NDK_VERSION)
            .with_external(Some(ndk_root.clone()))
            .locate()
            .unwrap();
        let tc = ndk.setup(&cfg, &EnvOverrides::none(), &staging).unwrap();

        let bin = ndk.toolchain_root(cfg.host_tag()).join("bin");
        assert_eq!(
            tc.cc(),
            bin.join("aarch64-linux-android24-clang").display().to_string()
        );
        assert!(tc.ar().ends_with("llvm-ar"));
        assert!(tc.cflags().contains("--sysroot="));
        assert!(tc.cppflags().contains(&staging.join("include").display().to_string()));
        assert_eq!(tc.host_flag().as_deref(), Some("--host=aarch64-linux-android"));
        assert_eq!(tc.api_level(), Some(24));
    }

    #[test]
    fn test_armv7a_uses_its_own_clang_prefix() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("armv7a", 21, tmp.path());
        let ndk_root = fake_ndk(tmp.path(), &cfg);

        let ndk = NdkLocator::new(tmp.path(), "r26d")
            .with_external(Some(ndk_root))
            .locate()
            .unwrap();
        let tc = ndk
            .setup(&cfg, &EnvOverrides::none(), &tmp.path().join("staging"))
            .unwrap();

        assert!(tc.cc().ends_with("armv7a-linux-androideabi21-clang"));
        assert_eq!(tc.host_flag().as_deref(), Some("--host=arm-linux-androideabi"));
    }

    #[test]
    fn test_overrides_win_over_derived_values() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("x86_64", 24, tmp.path());
        let ndk_root = fake_ndk(tmp.path(), &cfg);
        let overrides = EnvOverrides::from_pairs([("CFLAGS", "-O3"), ("CPPFLAGS", "")]);

        let ndk = NdkLocator::new(tmp.path(), "r26d")
            .with_external(Some(ndk_root))
            .locate()
            .unwrap();
        let tc = ndk
            .setup(&cfg, &overrides, &tmp.path().join("staging"))
            .unwrap();

        assert_eq!(tc.cflags(), "-O3");
        assert_eq!(tc.cppflags(), "");
        assert_eq!(tc.resolved()["CC"].layer, Layer::Derived);
    }

    #[test]
    fn test_missing_prebuilt_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("aarch64", 24, tmp.path()).with_host_tag("plan9-mips");
        let ndk_root = fake_ndk(tmp.path(), &config("aarch64", 24, tmp.path()));

        let ndk = NdkLocator::new(tmp.path(), "r26d")
            .with_external(Some(ndk_root))
            .locate()
            .unwrap();
        let err = ndk
            .setup(&cfg, &EnvOverrides::none(), &tmp.path().join("staging"))
            .unwrap_err();

        assert!(matches!(
            err,
            ToolchainError::ToolchainMissing { ref host_tag, .. } if host_tag == "plan9-mips"
        ));
    }

    #[test]
    fn test_unsupported_api_level_reports_missing_compiler() {
        let tmp = TempDir::new().unwrap();
        let ndk_root = fake_ndk(tmp.path(), &config("aarch64", 24, tmp.path()));
        let cfg = config("aarch64", 99, tmp.path());

        let ndk = NdkLocator::new(tmp.path(), "r26d")
            .with_external(Some(ndk_root))
            .locate()
            .unwrap();
        let err = ndk
            .setup(&cfg, &EnvOverrides::none(), &tmp.path().join("staging"))
            .unwrap_err();

        assert!(matches!(
            err,
            ToolchainError::CompilerMissing { api_level: 99, .. }
        ));
    }

    #[test]
    fn test_missing_external_falls_back_to_local() {
        let tmp = TempDir::new().unwrap();
        let locator = NdkLocator::new(tmp.path().join("ndk"), "r26d")
            .with_external(Some(tmp.path().join("does-not-exist")));
        assert!(locator.locate().is_none());

        fs::create_dir_all(locator.local_path()).unwrap();
        assert_eq!(locator.locate().unwrap().root(), locator.local_path());
    }

    #[test]
    fn test_ensure_downloads_and_extracts() {
        let tmp = TempDir::new().unwrap();
        let url = "https://example.com/android-ndk-r26d-linux.zip";
        let fetcher = RecordingFetcher::new();
        fetcher.serve(
            url,
            zip_bytes(&[(
                "android-ndk-r26d/source.properties",
                "Pkg.Desc = Android NDK\nPkg.Revision = 26.3.11579264\n",
            )]),
        );

        let locator =
            NdkLocator::new(tmp.path().join("ndk"), "r26d").with_url(Some(url.to_string()));
        let ndk = locator.ensure(&fetcher).unwrap();

        assert_eq!(ndk.root(), locator.local_path());
        assert_eq!(ndk.revision().as_deref(), Some("26.3.11579264"));

        // A second call finds the extracted tree.
        locator.ensure(&fetcher).unwrap();
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[test]
    fn test_ensure_fails_when_download_fails() {
        let tmp = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::new();
        let locator = NdkLocator::new(tmp.path().join("ndk"), "r26d")
            .with_url(Some("https://example.com/missing.zip".to_string()));

        let err = locator.ensure(&fetcher).unwrap_err();
        assert!(matches!(err, ToolchainError::NdkFetch(_)));
        assert!(!locator.local_path().exists());
    }
}

//! OpenSSL: perl `Configure` with an explicit platform id.

use std::ffi::OsString;
use std::path::Path;

use super::{require_source, run_step, toolchain_command, BuildStrategy, StrategyContext};
use crate::builder::driver::BuildError;
use crate::builder::toolchain::{TargetKind, ToolchainDescriptor};
use crate::util::process::ProcessBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSsl;

impl BuildStrategy for OpenSsl {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn fingerprint_extras(&self, toolchain: &ToolchainDescriptor) -> Vec<(String, String)> {
        vec![("platform".to_string(), platform(toolchain).to_string())]
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        require_source(component, src_dir)?;

        let mut configure = toolchain_command(ctx, "perl", src_dir)
            .arg("./Configure")
            .args(configure_args(ctx, extra_args));
        configure = with_ndk_env(configure, ctx.toolchain);
        run_step(component, "configure", &configure)?;

        let build = with_ndk_env(
            toolchain_command(ctx, "make", src_dir)
                .arg(format!("-j{}", ctx.jobs))
                .arg("build_libs"),
            ctx.toolchain,
        );
        run_step(component, "build", &build)?;

        // Headers, libraries and pkg-config files; no docs or binaries.
        let install = with_ndk_env(
            toolchain_command(ctx, "make", src_dir).arg("install_dev"),
            ctx.toolchain,
        );
        run_step(component, "install", &install)
    }
}

/// OpenSSL platform id, or `native` when building for the build machine.
fn platform(toolchain: &ToolchainDescriptor) -> &'static str {
    toolchain
        .arch()
        .map(|a| a.openssl_platform())
        .unwrap_or("native")
}

fn configure_args(ctx: &StrategyContext<'_>, extra_args: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(arch) = ctx.toolchain.arch() {
        args.push(arch.openssl_platform().to_string());
    }
    if let Some(api) = ctx.toolchain.api_level() {
        args.push(format!("-D__ANDROID_API__={}", api));
    }
    args.extend([
        format!("--prefix={}", ctx.prefix.display()),
        format!("--openssldir={}", ctx.prefix.join("ssl").display()),
        "--libdir=lib".to_string(),
        "no-shared".to_string(),
        "no-tests".to_string(),
        "no-ui-console".to_string(),
    ]);
    args.extend(extra_args.iter().cloned());
    args
}

/// OpenSSL's Android targets locate clang themselves from `PATH` and
/// `ANDROID_NDK_ROOT`. Explicit `CC`/`CXX` overrides are kept.
fn with_ndk_env(cmd: ProcessBuilder, toolchain: &ToolchainDescriptor) -> ProcessBuilder {
    let TargetKind::Cross {
        ref ndk_root,
        ref bin_dir,
        ..
    } = *toolchain.target()
    else {
        return cmd;
    };

    let mut paths = vec![bin_dir.clone()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    let path = std::env::join_paths(paths).unwrap_or_else(|_| OsString::from(bin_dir.as_os_str()));

    let mut cmd = cmd
        .env("PATH", path.to_string_lossy())
        .env("ANDROID_NDK_ROOT", ndk_root.display().to_string())
        .env("ANDROID_NDK_HOME", ndk_root.display().to_string());
    for (key, bare) in [("CC", "clang"), ("CXX", "clang++")] {
        if !toolchain.is_overridden(key) {
            cmd = cmd.env(key, bare);
        }
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{EnvOverrides, NdkLocator};
    use crate::core::BuildConfig;
    use crate::test_support::fake_ndk;
    use tempfile::TempDir;

    fn cross_toolchain(tmp: &Path, arch: &str) -> ToolchainDescriptor {
        cross_toolchain_with(tmp, arch, &EnvOverrides::none())
    }

    fn cross_toolchain_with(
        tmp: &Path,
        arch: &str,
        overrides: &EnvOverrides,
    ) -> ToolchainDescriptor {
        let cfg = BuildConfig::new(arch, 24, 2, tmp).unwrap();
        NdkLocator::new(tmp, "r26d")
            .with_external(Some(fake_ndk(tmp, &cfg)))
            .locate()
            .unwrap()
            .setup(&cfg, overrides, &tmp.join("staging"))
            .unwrap()
    }

    #[test]
    fn test_configure_args_name_platform_and_api() {
        let tmp = TempDir::new().unwrap();
        let tc = cross_toolchain(tmp.path(), "armv7a");
        let prefix = tmp.path().join("staging");
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: &prefix,
            jobs: 2,
        };

        let args = configure_args(&ctx, &[]);
        assert_eq!(args[0], "android-arm");
        assert_eq!(args[1], "-D__ANDROID_API__=24");
        assert!(args.contains(&"no-shared".to_string()));
    }

    #[test]
    fn test_platform_is_part_of_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let arm = cross_toolchain(tmp.path(), "aarch64");
        assert_eq!(
            OpenSsl.fingerprint_extras(&arm),
            vec![("platform".to_string(), "android-arm64".to_string())]
        );

        let native = ToolchainDescriptor::native(tmp.path());
        assert_eq!(OpenSsl.fingerprint_extras(&native)[0].1, "native");
    }

    #[test]
    fn test_ndk_env_prepends_toolchain_bin() {
        let tmp = TempDir::new().unwrap();
        let tc = cross_toolchain(tmp.path(), "x86_64");
        let cmd = with_ndk_env(ProcessBuilder::new("make"), &tc);

        let bin = tc.bin_dir().unwrap().display().to_string();
        assert!(cmd.get_env("PATH").unwrap().starts_with(&bin));
        assert_eq!(cmd.get_env("CC"), Some("clang"));
    }

    #[test]
    fn test_ndk_env_keeps_compiler_overrides() {
        let tmp = TempDir::new().unwrap();
        let overrides = EnvOverrides::from_pairs([("CC", "/opt/my-clang")]);
        let tc = cross_toolchain_with(tmp.path(), "aarch64", &overrides);
        let prefix = tmp.path().join("staging");
        let ctx = StrategyContext {
            toolchain: &tc,
            prefix: &prefix,
            jobs: 2,
        };

        let cmd = with_ndk_env(toolchain_command(&ctx, "make", tmp.path()), &tc);
        assert_eq!(cmd.get_env("CC"), Some("/opt/my-clang"));
        assert_eq!(cmd.get_env("CXX"), Some("clang++"));
    }
}

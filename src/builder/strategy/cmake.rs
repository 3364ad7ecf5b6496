//! Out-of-tree CMake builds.

use std::path::Path;

use super::{require_source, run_step, toolchain_command, BuildStrategy, StrategyContext};
use crate::builder::driver::BuildError;
use crate::builder::toolchain::{TargetKind, ToolchainDescriptor};
use crate::util::fs::ensure_dir;
use crate::util::process::find_executable;

/// Build directory created inside the source tree.
const BUILD_DIR: &str = "build";

/// Configure into `<src>/build`, then `cmake --build` and `cmake --install`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CMake;

impl BuildStrategy for CMake {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn build(
        &self,
        ctx: &StrategyContext<'_>,
        component: &str,
        src_dir: &Path,
        extra_args: &[String],
    ) -> Result<(), BuildError> {
        require_source(component, src_dir)?;

        let cmake = find_executable("cmake").ok_or_else(|| BuildError::ToolMissing {
            component: component.to_string(),
            tool: "cmake".to_string(),
        })?;

        let build_dir = src_dir.join(BUILD_DIR);
        ensure_dir(&build_dir).map_err(BuildError::io(format!(
            "failed to create {}",
            build_dir.display()
        )))?;

        let configure = toolchain_command(ctx, &cmake, src_dir)
            .arg("-S")
            .arg(src_dir)
            .arg("-B")
            .arg(&build_dir)
            .args(configure_args(ctx.toolchain, ctx.prefix))
            .args(extra_args);
        run_step(component, "configure", &configure)?;

        let build = toolchain_command(ctx, &cmake, src_dir)
            .arg("--build")
            .arg(&build_dir)
            .arg("--parallel")
            .arg(ctx.jobs.to_string())
            .arg("--config")
            .arg("Release");
        run_step(component, "build", &build)?;

        let install = toolchain_command(ctx, &cmake, src_dir)
            .arg("--install")
            .arg(&build_dir)
            .arg("--config")
            .arg("Release");
        run_step(component, "install", &install)
    }
}

/// Cache variables describing the target, compilers and search roots.
pub(crate) fn configure_args(toolchain: &ToolchainDescriptor, prefix: &Path) -> Vec<String> {
    let compile_flags = [toolchain.cflags(), toolchain.cppflags()]
        .iter()
        .filter(|f| !f.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let mut args = vec![
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()),
        "-DCMAKE_INSTALL_LIBDIR=lib".to_string(),
        "-DCMAKE_POSITION_INDEPENDENT_CODE=ON".to_string(),
        "-DBUILD_SHARED_LIBS=OFF".to_string(),
        format!("-DCMAKE_C_COMPILER={}", toolchain.cc()),
        format!("-DCMAKE_CXX_COMPILER={}", toolchain.cxx()),
        format!("-DCMAKE_AR={}", toolchain.ar()),
        format!("-DCMAKE_RANLIB={}", toolchain.ranlib()),
        format!("-DCMAKE_C_FLAGS={}", compile_flags),
    ];

    if let TargetKind::Cross {
        arch,
        api_level,
        ref ndk_root,
        ref sysroot,
        ..
    } = *toolchain.target()
    {
        args.extend([
            "-DCMAKE_SYSTEM_NAME=Android".to_string(),
            format!("-DCMAKE_SYSTEM_VERSION={}", api_level),
            format!("-DCMAKE_ANDROID_ARCH_ABI={}", arch.android_abi()),
            format!("-DCMAKE_ANDROID_NDK={}", ndk_root.display()),
            format!("-DCMAKE_SYSROOT={}", sysroot.display()),
            format!("-DCMAKE_FIND_ROOT_PATH={}", toolchain.staging().display()),
            "-DCMAKE_FIND_ROOT_PATH_MODE_PROGRAM=NEVER".to_string(),
            "-DCMAKE_FIND_ROOT_PATH_MODE_LIBRARY=ONLY".to_string(),
            "-DCMAKE_FIND_ROOT_PATH_MODE_INCLUDE=ONLY".to_string(),
            "-DCMAKE_FIND_ROOT_PATH_MODE_PACKAGE=ONLY".to_string(),
        ]);
    } else {
        args.push(format!("-DCMAKE_PREFIX_PATH={}", toolchain.staging().display()));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{EnvOverrides, NdkLocator};
    use crate::core::BuildConfig;
    use crate::test_support::fake_ndk;
    use tempfile::TempDir;

    #[test]
    fn test_cross_args_restrict_search_to_staging() {
        let tmp = TempDir::new().unwrap();
        let cfg = BuildConfig::new("aarch64", 24, 2, tmp.path()).unwrap();
        let ndk = NdkLocator::new(tmp.path(), "r26d")
            .with_external(Some(fake_ndk(tmp.path(), &cfg)))
            .locate()
            .unwrap();
        let staging = tmp.path().join("staging");
        let tc = ndk.setup(&cfg, &EnvOverrides::none(), &staging).unwrap();

        let args = configure_args(&tc, &staging);

        assert!(args.contains(&"-DCMAKE_SYSTEM_NAME=Android".to_string()));
        assert!(args.contains(&"-DCMAKE_ANDROID_ARCH_ABI=arm64-v8a".to_string()));
        assert!(args.contains(&format!("-DCMAKE_FIND_ROOT_PATH={}", staging.display())));
        assert!(args.contains(&"-DCMAKE_FIND_ROOT_PATH_MODE_LIBRARY=ONLY".to_string()));
        assert!(args.contains(&format!("-DCMAKE_C_COMPILER={}", tc.cc())));
    }

    #[test]
    fn test_native_args_use_prefix_path() {
        let tc = ToolchainDescriptor::native("/ws/host/staging");
        let args = configure_args(&tc, Path::new("/ws/host/install"));

        assert!(args.contains(&"-DCMAKE_INSTALL_PREFIX=/ws/host/install".to_string()));
        assert!(args.contains(&"-DCMAKE_PREFIX_PATH=/ws/host/staging".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-DCMAKE_SYSTEM_NAME")));
    }
}

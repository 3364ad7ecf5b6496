//! Post-build steps and distribution packaging.
//!
//! Stripping and the environment snippet are best effort: a failure is
//! logged and the run carries on. The build-info file and the archive
//! itself are not optional.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::util::fs::{ensure_dir, write_atomic};
use crate::util::process::{output_tail, ProcessBuilder};

/// File name of the environment snippet inside the output tree.
pub const ENV_SCRIPT: &str = "env.sh";

/// File name of the build record inside the output tree.
pub const BUILD_INFO: &str = "build-info.json";

/// `<product>-<version>-<triple><api>`, the archive stem and the name of
/// its top-level directory.
pub fn archive_stem(product: &str, version: &str, triple: &str, api_level: u32) -> String {
    format!("{}-{}-{}{}", product, version, triple, api_level)
}

/// Whether `path` names a shared object (`libfoo.so`, `libfoo.so.1`).
fn is_shared_object(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(".so") || name.contains(".so."))
}

/// Strip every shared object below `dir` with `strip_tool`.
///
/// Returns the number of files stripped. Failures are logged, never
/// returned.
pub fn strip_shared_objects(dir: &Path, strip_tool: &str) -> usize {
    let mut stripped = 0;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_shared_object(path) {
            continue;
        }

        let result = ProcessBuilder::new(strip_tool)
            .arg("--strip-unneeded")
            .arg(path)
            .exec();

        match result {
            Ok(output) if output.status.success() => stripped += 1,
            Ok(output) => tracing::warn!(
                "failed to strip {}: {}",
                path.display(),
                output_tail(&output.stderr, 3)
            ),
            Err(e) => {
                tracing::warn!("failed to strip {}: {}", path.display(), e);
                // The tool itself is unusable; no point trying the rest.
                break;
            }
        }
    }

    tracing::info!("Stripped {} shared object(s)", stripped);
    stripped
}

const ENV_SCRIPT_BODY: &str = r#"# Source this file to use the interpreter unpacked next to it.
CROSSPORT_HOME="$(cd "$(dirname "${BASH_SOURCE:-$0}")" && pwd)"
export PYTHONHOME="$CROSSPORT_HOME"
export PATH="$CROSSPORT_HOME/bin:$PATH"
export LD_LIBRARY_PATH="$CROSSPORT_HOME/lib${LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}"
"#;

/// Write `env.sh` into `output`.
pub fn write_env_script(output: &Path) -> io::Result<PathBuf> {
    let path = output.join(ENV_SCRIPT);
    write_atomic(&path, ENV_SCRIPT_BODY.as_bytes())?;
    Ok(path)
}

/// Record of what went into a packaged build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub product: String,
    pub version: String,
    pub arch: String,
    pub api_level: u32,
    pub target_triple: String,
    pub ndk_revision: Option<String>,
    /// Component name to build fingerprint
    pub components: BTreeMap<String, String>,
}

/// Write `build-info.json` into `output`.
pub fn write_build_info(output: &Path, info: &BuildInfo) -> io::Result<PathBuf> {
    let path = output.join(BUILD_INFO);
    let mut json = serde_json::to_vec_pretty(info).map_err(io::Error::other)?;
    json.push(b'\n');
    write_atomic(&path, &json)?;
    Ok(path)
}

/// Pack `output` into `dist/<stem>.tar.gz` under a top-level `<stem>/`.
///
/// The archive is assembled in a temporary file and renamed over any
/// previous archive of the same name.
pub fn package_output(output: &Path, dist: &Path, stem: &str) -> io::Result<PathBuf> {
    if !output.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("output directory {} does not exist", output.display()),
        ));
    }
    ensure_dir(dist)?;

    let dest = dist.join(format!("{}.tar.gz", stem));
    let tmp = tempfile::Builder::new()
        .prefix(".package-")
        .tempfile_in(dist)?;

    let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(stem, output)?;
    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()?;

    tmp.as_file().sync_all()?;
    tmp.persist(&dest).map_err(|e| e.error)?;

    tracing::info!("Packaged {}", dest.display());
    Ok(dest)
}

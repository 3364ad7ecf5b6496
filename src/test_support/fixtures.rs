//! Test fixtures: in-memory archives and a fake NDK tree.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::BuildConfig;

/// Bytes of a `.tar.gz` holding `entries` as `(path, contents)`.
pub fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .expect("failed to append tar entry");
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("failed to finish tar.gz")
}

/// Write a `.tar.gz` holding `entries` to `path`.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
    fs::write(path, tar_gz_bytes(entries)).expect("failed to write tar.gz");
}

/// Bytes of a `.zip` holding `entries` as `(path, contents)`.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);

    for (path, contents) in entries {
        writer
            .start_file(*path, options)
            .expect("failed to start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("failed to write zip entry");
    }

    writer.finish().expect("failed to finish zip").into_inner()
}

/// Write a `.zip` holding `entries` to `path`.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    fs::write(path, zip_bytes(entries)).expect("failed to write zip");
}

/// Create a minimal NDK under `base/fake-ndk` with the compiler wrappers
/// and LLVM tools `config` needs. Returns the NDK root.
///
/// Calling it again for another configuration adds that target's wrappers.
pub fn fake_ndk(base: &Path, config: &BuildConfig) -> PathBuf {
    let root = base.join("fake-ndk");
    let prebuilt = root
        .join("toolchains/llvm/prebuilt")
        .join(config.host_tag());
    let bin = prebuilt.join("bin");
    fs::create_dir_all(&bin).expect("failed to create fake NDK bin");
    fs::create_dir_all(prebuilt.join("sysroot/usr/include")).expect("failed to create sysroot");

    let clang = format!(
        "{}{}-clang",
        config.arch().clang_triple(),
        config.api_level()
    );
    let tools = [
        clang.clone(),
        format!("{}++", clang),
        "llvm-ar".to_string(),
        "llvm-ranlib".to_string(),
        "llvm-strip".to_string(),
        "ld.lld".to_string(),
    ];
    for tool in tools {
        write_script(&bin.join(tool), "#!/bin/sh\nexit 0\n");
    }

    fs::write(
        root.join("source.properties"),
        "Pkg.Desc = Android NDK\nPkg.Revision = 26.3.11579264\n",
    )
    .expect("failed to write source.properties");

    root
}

/// Write an executable script.
pub fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).expect("failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
    }
}

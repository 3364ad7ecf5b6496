//! Build fingerprints.
//!
//! A fingerprint captures every input that can change what a component
//! build produces: the exact source archive, the compile and preprocessor
//! flags, the target, and any strategy-specific discriminators. Two
//! builds with equal fingerprints produce interchangeable output.
//!
//! The canonical form is a single line of `key=value` pairs joined with
//! `;`, fixed keys first and extras sorted by key:
//!
//! ```text
//! archive=<sha256>;cflags=-O2 -fPIC;cppflags=-I/ws/staging/include;arch=aarch64;api=24;platform=android-arm64
//! ```
//!
//! Values escape `%`, `;`, `\r` and `\n`, so no value can forge a field
//! boundary or break the single-line marker format.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;

use crate::builder::toolchain::ToolchainDescriptor;
use crate::util::hash::sha256_file;

/// Inputs identifying one build of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    archive: String,
    cflags: String,
    cppflags: String,
    arch: String,
    api_level: Option<u32>,
    extra: BTreeMap<String, String>,
}

impl Fingerprint {
    /// Fingerprint of an archive with a known digest built by `toolchain`.
    pub fn new(archive_sha256: impl Into<String>, toolchain: &ToolchainDescriptor) -> Self {
        Fingerprint {
            archive: archive_sha256.into(),
            cflags: toolchain.cflags().to_string(),
            cppflags: toolchain.cppflags().to_string(),
            arch: toolchain
                .arch()
                .map(|a| a.as_str().to_string())
                .unwrap_or_else(|| "host".to_string()),
            api_level: toolchain.api_level(),
            extra: BTreeMap::new(),
        }
    }

    /// Hash `archive` and fingerprint it against `toolchain`.
    pub fn for_archive(archive: &Path, toolchain: &ToolchainDescriptor) -> io::Result<Self> {
        Ok(Self::new(sha256_file(archive)?, toolchain))
    }

    /// Add a strategy-specific discriminator.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn archive_sha256(&self) -> &str {
        &self.archive
    }

    /// The canonical single-line encoding, as stored in markers.
    pub fn canonical(&self) -> String {
        let mut out = format!(
            "archive={};cflags={};cppflags={};arch={}",
            escape(&self.archive),
            escape(&self.cflags),
            escape(&self.cppflags),
            escape(&self.arch),
        );
        if let Some(api) = self.api_level {
            out.push_str(&format!(";api={}", api));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!(";{}={}", escape(key), escape(value)));
        }
        out
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ';' => out.push_str("%3B"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{EnvOverrides, NdkLocator};
    use crate::core::BuildConfig;
    use crate::test_support::fake_ndk;
    use tempfile::TempDir;

    fn cross(tmp: &Path, overrides: &EnvOverrides) -> ToolchainDescriptor {
        let cfg = BuildConfig::new("aarch64", 24, 1, tmp).unwrap();
        NdkLocator::new(tmp, "r26d")
            .with_external(Some(fake_ndk(tmp, &cfg)))
            .locate()
            .unwrap()
            .setup(&cfg, overrides, &tmp.join("staging"))
            .unwrap()
    }

    #[test]
    fn test_canonical_format() {
        let tmp = TempDir::new().unwrap();
        let tc = cross(
            tmp.path(),
            &EnvOverrides::from_pairs([("CFLAGS", "-O2"), ("CPPFLAGS", "")]),
        );

        let fp = Fingerprint::new("abc123", &tc).with_extra("platform", "android-arm64");
        assert_eq!(
            fp.canonical(),
            "archive=abc123;cflags=-O2;cppflags=;arch=aarch64;api=24;platform=android-arm64"
        );
    }

    #[test]
    fn test_native_fingerprint_has_no_api() {
        let tc = ToolchainDescriptor::native("/ws/host/staging");
        let fp = Fingerprint::new("abc", &tc);
        assert_eq!(fp.canonical(), "archive=abc;cflags=-O2;cppflags=;arch=host");
    }

    #[test]
    fn test_flags_change_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let o2 = cross(tmp.path(), &EnvOverrides::from_pairs([("CFLAGS", "-O2")]));
        let o3 = cross(tmp.path(), &EnvOverrides::from_pairs([("CFLAGS", "-O3")]));

        assert_ne!(
            Fingerprint::new("abc", &o2).canonical(),
            Fingerprint::new("abc", &o3).canonical()
        );
    }

    #[test]
    fn test_values_cannot_forge_fields() {
        let tmp = TempDir::new().unwrap();
        let tc = cross(
            tmp.path(),
            &EnvOverrides::from_pairs([("CFLAGS", "-O2;arch=x86_64\n"), ("CPPFLAGS", "100%")]),
        );

        let fp = Fingerprint::new("abc", &tc).canonical();
        assert!(fp.contains("cflags=-O2%3Barch=x86_64%0A;"));
        assert!(fp.contains("cppflags=100%25;"));
        assert!(!fp.contains('\n'));
    }

    #[test]
    fn test_extras_sorted_by_key() {
        let tc = ToolchainDescriptor::native("/s");
        let fp = Fingerprint::new("abc", &tc)
            .with_extra("zeta", "1")
            .with_extra("alpha", "2");
        assert!(fp.canonical().ends_with(";alpha=2;zeta=1"));
    }

    #[test]
    fn test_for_archive_hashes_file() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("zlib-1.3.1.tar.gz");
        std::fs::write(&archive, "hello").unwrap();

        let fp = Fingerprint::for_archive(&archive, &ToolchainDescriptor::native("/s")).unwrap();
        assert_eq!(
            fp.archive_sha256(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}

//! Android target architectures.
//!
//! The set of architectures is closed: anything outside it is rejected,
//! never mapped to a default.

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A supported Android CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arch {
    Aarch64,
    Armv7a,
    X86_64,
    I686,
}

/// The architecture name is not one of [`Arch::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("unknown architecture `{0}`")]
#[diagnostic(
    code(crossport::config::unknown_arch),
    help("supported architectures are: aarch64, armv7a, x86_64, i686")
)]
pub struct UnknownArch(pub String);

impl Arch {
    /// Every supported architecture.
    pub const ALL: [Arch; 4] = [Arch::Aarch64, Arch::Armv7a, Arch::X86_64, Arch::I686];

    /// Canonical name, as accepted by [`Arch::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Aarch64 => "aarch64",
            Arch::Armv7a => "armv7a",
            Arch::X86_64 => "x86_64",
            Arch::I686 => "i686",
        }
    }

    /// GNU target triple, used for `--host=` and binutils-style tool names.
    pub fn target_triple(&self) -> &'static str {
        match self {
            Arch::Aarch64 => "aarch64-linux-android",
            Arch::Armv7a => "arm-linux-androideabi",
            Arch::X86_64 => "x86_64-linux-android",
            Arch::I686 => "i686-linux-android",
        }
    }

    /// Triple prefix of the NDK's clang wrapper scripts.
    ///
    /// Only 32-bit ARM differs from [`Arch::target_triple`].
    pub fn clang_triple(&self) -> &'static str {
        match self {
            Arch::Armv7a => "armv7a-linux-androideabi",
            other => other.target_triple(),
        }
    }

    /// Android ABI name (`jniLibs` directory name).
    pub fn android_abi(&self) -> &'static str {
        match self {
            Arch::Aarch64 => "arm64-v8a",
            Arch::Armv7a => "armeabi-v7a",
            Arch::X86_64 => "x86_64",
            Arch::I686 => "x86",
        }
    }

    /// Platform identifier understood by OpenSSL's `Configure`.
    pub fn openssl_platform(&self) -> &'static str {
        match self {
            Arch::Aarch64 => "android-arm64",
            Arch::Armv7a => "android-arm",
            Arch::X86_64 => "android-x86_64",
            Arch::I686 => "android-x86",
        }
    }
}

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownArch(s.to_string()))
    }
}

impl TryFrom<String> for Arch {
    type Error = UnknownArch;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Arch> for String {
    fn from(arch: Arch) -> String {
        arch.as_str().to_string()
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

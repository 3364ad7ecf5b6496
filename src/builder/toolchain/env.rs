//! Layered resolution of toolchain variables.
//!
//! Every toolchain variable is resolved from three layers, highest
//! precedence first:
//!
//! 1. explicit overrides (process environment, then `[toolchain]` config)
//! 2. values derived from the located NDK and the build configuration
//! 3. built-in defaults
//!
//! The process environment is read once, at startup, into an
//! [`EnvOverrides`] snapshot; nothing later consults the ambient
//! environment for toolchain settings.

use std::collections::BTreeMap;
use std::fmt;

/// Variables that make up the toolchain contract.
pub const TOOLCHAIN_VARS: [&str; 14] = [
    "CC",
    "CXX",
    "AS",
    "AR",
    "RANLIB",
    "LD",
    "STRIP",
    "CFLAGS",
    "CXXFLAGS",
    "CPPFLAGS",
    "LDFLAGS",
    "SYSROOT",
    "PKG_CONFIG_PATH",
    "PKG_CONFIG_LIBDIR",
];

/// Which layer a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Override,
    Derived,
    Default,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Layer::Override => "override",
            Layer::Derived => "derived",
            Layer::Default => "default",
        })
    }
}

/// A resolved variable and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVar {
    pub value: String,
    pub layer: Layer,
}

/// Snapshot of explicitly overridden toolchain variables.
///
/// A variable that is set, even to the empty string, counts as overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvOverrides {
    /// No overrides at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Capture the toolchain variables currently set in the process
    /// environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Capture toolchain variables through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = TOOLCHAIN_VARS
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
            .collect();
        EnvOverrides { vars }
    }

    /// Build overrides from explicit pairs. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| TOOLCHAIN_VARS.contains(&k.as_str()))
            .collect();
        EnvOverrides { vars }
    }

    /// Combine with a lower-precedence set; values in `self` win.
    pub fn over(mut self, lower: EnvOverrides) -> Self {
        for (key, value) in lower.vars {
            self.vars.entry(key).or_insert(value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Resolve every variable known to any layer.
pub fn resolve(
    overrides: &EnvOverrides,
    derived: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> BTreeMap<String, ResolvedVar> {
    let keys = overrides
        .vars
        .keys()
        .chain(derived.keys())
        .chain(defaults.keys());

    let mut resolved = BTreeMap::new();
    for key in keys {
        if resolved.contains_key(key) {
            continue;
        }
        let var = if let Some(value) = overrides.get(key) {
            ResolvedVar {
                value: value.to_string(),
                layer: Layer::Override,
            }
        } else if let Some(value) = derived.get(key) {
            ResolvedVar {
                value: value.clone(),
                layer: Layer::Derived,
            }
        } else if let Some(value) = defaults.get(key) {
            ResolvedVar {
                value: value.clone(),
                layer: Layer::Default,
            }
        } else {
            continue;
        };
        resolved.insert(key.clone(), var);
    }
    resolved
}

/// Defaults shared by every toolchain.
pub fn default_layer() -> BTreeMap<String, String> {
    [
        ("CC", "cc"),
        ("CXX", "c++"),
        ("AS", "as"),
        ("AR", "ar"),
        ("RANLIB", "ranlib"),
        ("LD", "ld"),
        ("STRIP", "strip"),
        ("CFLAGS", "-O2"),
        ("CXXFLAGS", "-O2"),
        ("CPPFLAGS", ""),
        ("LDFLAGS", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_override_beats_derived_beats_default() {
        let overrides = EnvOverrides::from_pairs([("CFLAGS", "-O3")]);
        let derived = map(&[("CFLAGS", "-O2 -fPIC"), ("CC", "/ndk/clang")]);
        let defaults = default_layer();

        let resolved = resolve(&overrides, &derived, &defaults);

        assert_eq!(resolved["CFLAGS"].value, "-O3");
        assert_eq!(resolved["CFLAGS"].layer, Layer::Override);
        assert_eq!(resolved["CC"].value, "/ndk/clang");
        assert_eq!(resolved["CC"].layer, Layer::Derived);
        assert_eq!(resolved["LDFLAGS"].value, "");
        assert_eq!(resolved["LDFLAGS"].layer, Layer::Default);
    }

    #[test]
    fn test_empty_override_still_wins() {
        let overrides = EnvOverrides::from_pairs([("CPPFLAGS", "")]);
        let derived = map(&[("CPPFLAGS", "-I/staging/include")]);

        let resolved = resolve(&overrides, &derived, &BTreeMap::new());
        assert_eq!(resolved["CPPFLAGS"].value, "");
        assert_eq!(resolved["CPPFLAGS"].layer, Layer::Override);
    }

    #[test]
    fn test_from_lookup_only_captures_toolchain_vars() {
        let overrides = EnvOverrides::from_lookup(|key| match key {
            "CC" => Some("clang".to_string()),
            "HOME" => Some("/root".to_string()),
            _ => None,
        });

        assert_eq!(overrides.get("CC"), Some("clang"));
        assert_eq!(overrides.get("HOME"), None);
        assert_eq!(overrides.iter().count(), 1);
    }

    #[test]
    fn test_over_prefers_self() {
        let env = EnvOverrides::from_pairs([("CC", "env-cc")]);
        let file = EnvOverrides::from_pairs([("CC", "file-cc"), ("AR", "file-ar")]);

        let merged = env.over(file);
        assert_eq!(merged.get("CC"), Some("env-cc"));
        assert_eq!(merged.get("AR"), Some("file-ar"));
    }

    #[test]
    fn test_from_pairs_ignores_unknown_keys() {
        let overrides = EnvOverrides::from_pairs([("PATH", "/bin"), ("LD", "ld.lld")]);
        assert_eq!(overrides.get("PATH"), None);
        assert_eq!(overrides.get("LD"), Some("ld.lld"));
    }
}

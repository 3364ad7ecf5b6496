//! Build markers.
//!
//! A marker records that a component was built and installed, and with
//! which fingerprint. It is the only evidence of a finished build: it is
//! written after a successful install and never before, and it is
//! replaced atomically so an interrupted write leaves either the previous
//! marker or none.
//!
//! Markers live at `<dir>/<component>.marker` and contain the canonical
//! fingerprint followed by a single newline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::util::fs::{ensure_dir, remove_file_if_exists, write_atomic_with};

pub const MARKER_SUFFIX: &str = ".marker";

type RenameFn = fn(&Path, &Path) -> io::Result<()>;

/// Directory of build markers for one target.
#[derive(Debug, Clone)]
pub struct MarkerCache {
    dir: PathBuf,
    rename: RenameFn,
}

impl MarkerCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MarkerCache {
            dir: dir.into(),
            rename: rename_into_place,
        }
    }

    /// Marker cache whose final rename is replaced, to simulate crashes.
    #[cfg(test)]
    pub(crate) fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker_path(&self, component: &str) -> PathBuf {
        self.dir.join(format!("{}{}", component, MARKER_SUFFIX))
    }

    /// Record `component` as built with `fingerprint`.
    pub fn mark_built(&self, component: &str, fingerprint: &str) -> io::Result<()> {
        validate_name(component)?;
        ensure_dir(&self.dir)?;

        let contents = format!("{}\n", fingerprint);
        write_atomic_with(
            &self.marker_path(component),
            contents.as_bytes(),
            self.rename,
        )?;

        tracing::debug!("Marked {} as built", component);
        Ok(())
    }

    /// Whether any marker exists for `component`.
    pub fn is_built(&self, component: &str) -> bool {
        validate_name(component).is_ok() && self.marker_path(component).is_file()
    }

    /// Whether `component` was built with exactly `fingerprint`.
    ///
    /// A missing, unreadable or differing marker is simply "not built".
    pub fn is_built_match(&self, component: &str, fingerprint: &str) -> bool {
        match self.read(component) {
            Ok(Some(stored)) => stored == fingerprint,
            _ => false,
        }
    }

    /// The fingerprint stored for `component`, if any.
    pub fn read(&self, component: &str) -> io::Result<Option<String>> {
        validate_name(component)?;
        match fs::read_to_string(self.marker_path(component)) {
            Ok(contents) => Ok(Some(
                contents.strip_suffix('\n').unwrap_or(&contents).to_string(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the marker for `component`. Missing markers are fine.
    pub fn clear_marker(&self, component: &str) -> io::Result<()> {
        validate_name(component)?;
        remove_file_if_exists(&self.marker_path(component))
    }

    /// Every marker in the cache as `(component, fingerprint)`, sorted by
    /// component.
    pub fn list(&self) -> io::Result<Vec<(String, String)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut markers = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            // Stray files such as `.marker` name no component.
            let Some(component) = name
                .to_str()
                .and_then(|n| n.strip_suffix(MARKER_SUFFIX))
                .filter(|c| validate_name(c).is_ok())
            else {
                continue;
            };
            if let Some(fingerprint) = self.read(component)? {
                markers.push((component.to_string(), fingerprint));
            }
        }
        markers.sort();
        Ok(markers)
    }

    /// Remove every marker, forcing a full rebuild.
    pub fn clear_all(&self) -> io::Result<usize> {
        let markers = self.list()?;
        for (component, _) in &markers {
            self.clear_marker(component)?;
        }
        Ok(markers.len())
    }
}

fn rename_into_place(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn validate_name(component: &str) -> io::Result<()> {
    let bad = component.is_empty()
        || component.starts_with('.')
        || component.contains(['/', '\\']);
    if bad {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid component name `{}`", component),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mark_then_match() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path().join(".built"));

        assert!(!cache.is_built("zlib"));
        cache.mark_built("zlib", "archive=abc;cflags=-O2").unwrap();

        assert!(cache.is_built("zlib"));
        assert!(cache.is_built_match("zlib", "archive=abc;cflags=-O2"));
        assert!(!cache.is_built_match("zlib", "archive=abc;cflags=-O3"));
        assert!(!cache.is_built_match("bzip2", "archive=abc;cflags=-O2"));
    }

    #[test]
    fn test_marker_file_format() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("xz", "archive=1;cflags=").unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("xz.marker")).unwrap(),
            "archive=1;cflags=\n"
        );
    }

    #[test]
    fn test_remark_replaces_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("zlib", "old").unwrap();
        cache.mark_built("zlib", "new").unwrap();

        assert_eq!(cache.read("zlib").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_clear_marker() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("zlib", "fp").unwrap();

        cache.clear_marker("zlib").unwrap();
        assert!(!cache.is_built("zlib"));
        cache.clear_marker("zlib").unwrap();
    }

    #[test]
    fn test_interrupted_write_keeps_previous_marker() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("openssl", "first").unwrap();

        let crashing = MarkerCache::new(tmp.path())
            .with_rename(|_, _| Err(io::Error::new(io::ErrorKind::Other, "power loss")));
        assert!(crashing.mark_built("openssl", "second").is_err());

        assert!(cache.is_built_match("openssl", "first"));
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["openssl.marker"]);
    }

    #[test]
    fn test_interrupted_first_write_leaves_no_marker() {
        let tmp = TempDir::new().unwrap();
        let crashing = MarkerCache::new(tmp.path())
            .with_rename(|_, _| Err(io::Error::new(io::ErrorKind::Other, "power loss")));

        assert!(crashing.mark_built("sqlite", "fp").is_err());
        assert!(!crashing.is_built("sqlite"));
    }

    #[test]
    fn test_list_and_clear_all() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("zlib", "z").unwrap();
        cache.mark_built("bzip2", "b").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(
            cache.list().unwrap(),
            vec![
                ("bzip2".to_string(), "b".to_string()),
                ("zlib".to_string(), "z".to_string())
            ]
        );
        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path().join("absent"));
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        assert!(cache.mark_built("../escape", "fp").is_err());
        assert!(cache.mark_built("", "fp").is_err());
        assert!(!cache.is_built("a/b"));
    }

    #[test]
    fn test_list_skips_files_without_component_name() {
        let tmp = TempDir::new().unwrap();
        let cache = MarkerCache::new(tmp.path());
        cache.mark_built("zlib", "fp-zlib").unwrap();
        fs::write(tmp.path().join(".marker"), "stray\n").unwrap();
        fs::write(tmp.path().join("..marker"), "stray\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(
            cache.list().unwrap(),
            vec![("zlib".to_string(), "fp-zlib".to_string())]
        );
        assert_eq!(cache.clear_all().unwrap(), 1);
        assert!(tmp.path().join(".marker").exists());
    }
}

//! Content hashing for archives and fingerprints.
//!
//! All digests are SHA-256, computed in-process, so the algorithm never
//! varies between machines or runs. Markers compare digests as opaque
//! strings: switching algorithm would silently invalidate every marker.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// Compute SHA256 hash of a file.
///
/// Fails with [`io::ErrorKind::NotFound`] if the file does not exist.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to open file for hashing: {}: {}", path.display(), e),
        )
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_str() {
        let hash = sha256_str("hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha256_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        std::fs::write(&path, "hello").unwrap();

        let hash = sha256_file(&path).unwrap();
        assert_eq!(hash, sha256_str("hello"));

        // Same bytes, same digest
        assert_eq!(sha256_file(&path).unwrap(), hash);
    }

    #[test]
    fn test_sha256_file_missing() {
        let tmp = TempDir::new().unwrap();
        let err = sha256_file(&tmp.path().join("absent.tar.gz")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

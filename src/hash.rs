//! Content addressing for reviewed build files.
//!
//! A build recipe or install hook is identified by the BLAKE3 hash of its
//! bytes. The review cache compares these, never the contents, to tell
//! whether a file changed since it was last approved.

use std::fmt;
use std::path::Path;

/// BLAKE3 digest of a reviewable file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(blake3::hash(bytes).into())
    }

    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read(path).map(|bytes| Self::of(&bytes))
    }

    /// Lowercase hex, the format of the `.blake3` sidecar files.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Inverse of [`ContentHash::to_hex`]. Anything but 64 hex digits is
    /// rejected, so a truncated sidecar never matches.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(|h| ContentHash(h.into()))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_format() {
        let hash = ContentHash::of(b"pkgname=foo\n");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(ContentHash::from_hex(&hex), Some(hash));
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn test_truncated_or_garbled_sidecar_is_rejected() {
        let hex = ContentHash::of(b"x").to_hex();
        assert!(ContentHash::from_hex(&hex[..63]).is_none());
        assert!(ContentHash::from_hex(&"g".repeat(64)).is_none());
        assert!(ContentHash::from_hex("").is_none());
    }

    #[test]
    fn test_one_byte_changes_the_hash() {
        assert_ne!(
            ContentHash::of(b"pkgver=1.0"),
            ContentHash::of(b"pkgver=1.1")
        );
    }

    #[test]
    fn test_of_file_matches_of_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("PKGBUILD");
        std::fs::write(&path, "build() { :; }\n").unwrap();
        assert_eq!(
            ContentHash::of_file(&path).unwrap(),
            ContentHash::of(b"build() { :; }\n")
        );
    }
}

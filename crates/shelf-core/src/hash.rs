//! Content-based hashing for change detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Separator written between fields by [`ContentHash::from_fields`].
const FIELD_SEPARATOR: u8 = 0x1f;

const PREFIX: &str = "sha256:";

/// A SHA-256 based content hash.
///
/// Backs both the configuration fingerprint and the content-addressed
/// build output, so a changed config or a changed file is detected by
/// comparing two hex strings.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Hash an ordered sequence of fields.
    ///
    /// Fields are delimited so that `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_ref().as_bytes());
            hasher.update([FIELD_SEPARATOR]);
        }
        Self(hasher.finalize().into())
    }

    /// Hash a file, streaming it through the hasher
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hasher.finalize().into()))
    }

    /// Lowercase hex, 64 characters
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The stored form, `sha256:<hex>`
    pub fn to_prefixed_hex(&self) -> String {
        format!("{}{}", PREFIX, self.to_hex())
    }

    pub fn from_prefixed_hex(text: &str) -> Option<Self> {
        Self::from_hex(text.strip_prefix(PREFIX)?)
    }

    /// Parse a bare 64-character hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_hash_is_deterministic() {
        assert_eq!(ContentHash::from_text("Assets/Art"), ContentHash::from_text("Assets/Art"));
        assert_ne!(ContentHash::from_text("Assets/Art"), ContentHash::from_text("Assets/Audio"));
    }

    #[test]
    fn test_file_hash_matches_bytes() {
        let path = std::env::temp_dir().join(format!("shelf_hash_{}.bin", std::process::id()));
        std::fs::write(&path, b"pixels").unwrap();
        assert_eq!(ContentHash::from_file(&path).unwrap(), ContentHash::from_bytes(b"pixels"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = ContentHash::from_fields(["ab", "c"]);
        let b = ContentHash::from_fields(["a", "bc"]);
        assert_ne!(a, b);
        assert_eq!(a, ContentHash::from_fields(vec!["ab".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_stored_form_parses_back() {
        let hash = ContentHash::from_text("icons/sword");
        let stored = hash.to_prefixed_hex();
        assert_eq!(stored.len(), 7 + 64);
        assert_eq!(ContentHash::from_prefixed_hex(&stored), Some(hash));
    }

    #[test]
    fn test_malformed_hex_rejected() {
        assert!(ContentHash::from_prefixed_hex("md5:abc").is_none());
        assert!(ContentHash::from_prefixed_hex("sha256:tooshort").is_none());
        assert!(ContentHash::from_hex(&"z".repeat(64)).is_none());
    }
}

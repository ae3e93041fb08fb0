//! Content-addressed storage for packaged resources

use shelf_core::{ContentHash, Result, ShelfError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Content-addressed file storage
///
/// Stores files at `<root>/<first-2-hex>/<full-hash>.<ext>`, so identical
/// resources under different addresses are packaged once.
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Create a new content store at the given root directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a file; returns its hash and the path it was stored at, relative to the root
    pub fn store<P: AsRef<Path>>(&self, source_path: P) -> Result<(ContentHash, PathBuf)> {
        let source = source_path.as_ref();
        let hash = ContentHash::from_file(source).map_err(|e| {
            ShelfError::Build(format!("Failed to hash {}: {}", source.display(), e))
        })?;

        let relative = Self::relative_path(&hash, source);
        let dest = self.root.join(&relative);
        if dest.exists() {
            return Ok((hash, relative));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &dest)?;
        Ok((hash, relative))
    }

    /// Get the storage path for a hash
    pub fn get(&self, hash: &ContentHash) -> Option<PathBuf> {
        let hex = hash.to_hex();
        let dir = self.root.join(&hex[..2]);

        fs::read_dir(&dir)
            .ok()?
            .flatten()
            .find(|entry| entry.file_name().to_string_lossy().starts_with(&hex))
            .map(|entry| entry.path())
    }

    /// Check if a hash exists in the store
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.get(hash).is_some()
    }

    /// List all stored hashes
    pub fn list(&self) -> Result<Vec<ContentHash>> {
        let mut hashes = Vec::new();

        if !self.root.exists() {
            return Ok(hashes);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            for file_entry in fs::read_dir(entry.path())? {
                let name = file_entry?.file_name();
                let name = name.to_string_lossy();
                if let Some(hash) = name.split('.').next().and_then(ContentHash::from_hex) {
                    hashes.push(hash);
                }
            }
        }

        Ok(hashes)
    }

    /// Remove every stored file whose hash is not in `keep`; returns how many were removed
    pub fn prune(&self, keep: &HashSet<ContentHash>) -> Result<usize> {
        let mut removed = 0;
        for hash in self.list()? {
            if keep.contains(&hash) {
                continue;
            }
            if let Some(path) = self.get(&hash) {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn relative_path(hash: &ContentHash, source: &Path) -> PathBuf {
        let hex = hash.to_hex();
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");

        PathBuf::from(&hex[..2]).join(format!("{}.{}", hex, ext))
    }
}

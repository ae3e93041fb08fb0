//! Build manifest: what a packaging pass produced
//!
//! Written by the filesystem backend after packaging and read at run time to
//! resolve addresses and labels to stored content.

use serde::{Deserialize, Serialize};
use shelf_core::{Result, ShelfError};
use std::path::Path;

/// File name of the manifest inside the build directory
pub const MANIFEST_FILE: &str = "manifest.toml";

/// One packaged resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub address: String,
    pub resource: String,
    pub group: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub content_hash: String,
    /// Path of the stored content, relative to the build directory
    pub stored_path: String,
}

impl ManifestEntry {
    /// Whether this entry is selected by a folder-or-label key.
    ///
    /// A key selects entries carrying it as a label, entries whose address
    /// equals it, and entries whose address lies below it as a folder.
    pub fn selected_by(&self, key: &str) -> bool {
        if self.labels.iter().any(|l| l == key) || self.address == key {
            return true;
        }
        let folder = key.trim_end_matches('/');
        !folder.is_empty()
            && self
                .address
                .strip_prefix(folder)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub built_at: String,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

/// TOML wrapper
#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    manifest: BuildManifest,
}

impl BuildManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self {
            built_at: chrono::Utc::now().to_rfc3339(),
            entries,
        }
    }

    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ManifestFile = toml::from_str(&content).map_err(|e| {
            ShelfError::Load(format!("Failed to parse manifest {}: {}", path.display(), e))
        })?;
        Ok(file.manifest)
    }

    /// Save manifest to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ManifestFile {
            manifest: self.clone(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| {
            ShelfError::Build(format!("Failed to serialize manifest: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// First entry with the given address
    pub fn by_address(&self, address: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    /// Every entry selected by a folder-or-label key, in manifest order
    pub fn select(&self, key: &str) -> Vec<&ManifestEntry> {
        self.entries.iter().filter(|e| e.selected_by(key)).collect()
    }
}

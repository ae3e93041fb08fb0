//! Address catalog: the filesystem backend's record of groups and entries

use serde::{Deserialize, Serialize};
use shelf_core::{Result, ShelfError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Name of the group every catalog starts with
pub const DEFAULT_GROUP: &str = "Default Local Group";

/// One addressable resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Project-relative resource path
    pub resource: String,
    pub address: String,
    pub group: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// TOML file format for the catalog
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    entries: Vec<CatalogEntry>,
}

/// Catalog of groups and addressable entries
#[derive(Debug, Clone)]
pub struct AddressCatalog {
    /// Entries indexed by resource path
    entries: BTreeMap<String, CatalogEntry>,
    groups: BTreeSet<String>,
}

impl Default for AddressCatalog {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            groups: BTreeSet::from([DEFAULT_GROUP.to_string()]),
        }
    }
}

impl AddressCatalog {
    /// Create a new catalog holding only the default group
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog file; a missing file gives an empty catalog
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut catalog = Self::new();
        if !path.exists() {
            return Ok(catalog);
        }

        let content = fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&content).map_err(|e| {
            ShelfError::Backend(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        catalog.groups.extend(file.groups);
        for entry in file.entries {
            catalog.groups.insert(entry.group.clone());
            catalog.entries.insert(entry.resource.clone(), entry);
        }
        Ok(catalog)
    }

    /// Write the whole catalog in one go
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CatalogFile {
            groups: self.groups.iter().cloned().collect(),
            entries: self.entries.values().cloned().collect(),
        };
        fs::write(path, toml::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    /// Add a group; returns false when it already existed
    pub fn add_group(&mut self, name: &str) -> bool {
        self.groups.insert(name.to_string())
    }

    /// Place or move a resource, keeping its labels
    pub fn upsert(&mut self, resource: &str, group: &str, address: &str) -> Result<()> {
        if !self.groups.contains(group) {
            return Err(ShelfError::Backend(format!("unknown group '{}'", group)));
        }
        let entry = self
            .entries
            .entry(resource.to_string())
            .or_insert_with(|| CatalogEntry {
                resource: resource.to_string(),
                address: String::new(),
                group: String::new(),
                labels: Vec::new(),
            });
        entry.group = group.to_string();
        entry.address = address.to_string();
        Ok(())
    }

    /// Attach a label to an existing entry
    pub fn attach_label(&mut self, resource: &str, label: &str) -> Result<()> {
        let entry = self
            .entries
            .get_mut(resource)
            .ok_or_else(|| ShelfError::Backend(format!("{} has no catalog entry", resource)))?;
        if !entry.labels.iter().any(|l| l == label) {
            entry.labels.push(label.to_string());
        }
        Ok(())
    }

    /// Drop an entry; returns it if it existed
    pub fn remove(&mut self, resource: &str) -> Option<CatalogEntry> {
        self.entries.remove(resource)
    }

    /// Get an entry by resource path
    pub fn get(&self, resource: &str) -> Option<&CatalogEntry> {
        self.entries.get(resource)
    }

    /// Get all entries carrying a label
    pub fn by_label(&self, label: &str) -> Vec<&CatalogEntry> {
        self.entries
            .values()
            .filter(|e| e.labels.iter().any(|l| l == label))
            .collect()
    }

    /// Get all entries in a group
    pub fn by_group(&self, group: &str) -> Vec<&CatalogEntry> {
        self.entries.values().filter(|e| e.group == group).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AddressCatalog {
        let mut catalog = AddressCatalog::new();
        catalog.add_group("png");
        catalog
            .upsert("Assets/Art/icons/sword.png", "png", "icons/sword")
            .unwrap();
        catalog
            .upsert("Assets/Art/ui/button.png", DEFAULT_GROUP, "ui/button")
            .unwrap();
        catalog.attach_label("Assets/Art/ui/button.png", "ui").unwrap();
        catalog
    }

    #[test]
    fn test_upsert_and_get() {
        let catalog = sample();
        let entry = catalog.get("Assets/Art/icons/sword.png").unwrap();
        assert_eq!(entry.address, "icons/sword");
        assert_eq!(entry.group, "png");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_upsert_unknown_group() {
        let mut catalog = AddressCatalog::new();
        assert!(catalog.upsert("a.png", "missing", "a").is_err());
    }

    #[test]
    fn test_move_keeps_labels() {
        let mut catalog = sample();
        catalog.add_group("ui");
        catalog
            .upsert("Assets/Art/ui/button.png", "ui", "button")
            .unwrap();
        let entry = catalog.get("Assets/Art/ui/button.png").unwrap();
        assert_eq!(entry.group, "ui");
        assert_eq!(entry.labels, vec!["ui"]);
    }

    #[test]
    fn test_by_label_and_group() {
        let catalog = sample();
        assert_eq!(catalog.by_label("ui").len(), 1);
        assert!(catalog.by_label("nonexistent").is_empty());
        assert_eq!(catalog.by_group("png").len(), 1);
    }

    #[test]
    fn test_label_not_duplicated() {
        let mut catalog = sample();
        catalog.attach_label("Assets/Art/ui/button.png", "ui").unwrap();
        assert_eq!(catalog.get("Assets/Art/ui/button.png").unwrap().labels.len(), 1);
        assert!(catalog.attach_label("nope.png", "ui").is_err());
    }

    #[test]
    fn test_remove() {
        let mut catalog = sample();
        assert!(catalog.remove("Assets/Art/icons/sword.png").is_some());
        assert!(catalog.remove("Assets/Art/icons/sword.png").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("shelf_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("catalog.toml");

        let catalog = sample();
        catalog.save(&path).unwrap();
        let loaded = AddressCatalog::load_from_file(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(loaded.has_group("png"));
        assert!(loaded.has_group(DEFAULT_GROUP));
        assert_eq!(loaded.by_label("ui").len(), 1);

        fs::remove_dir_all(&dir).ok();
    }
}

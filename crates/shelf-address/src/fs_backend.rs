//! Filesystem backend: resources are files under a project root
//!
//! Assignments are kept in an [`AddressCatalog`] written to
//! `<root>/.shelf/catalog.toml` on persist. Packaging copies every catalog
//! entry into a content-addressed store under the build directory and writes a
//! [`BuildManifest`] next to it.

use crate::backend::AssetBackend;
use crate::catalog::{AddressCatalog, DEFAULT_GROUP};
use crate::manifest::{BuildManifest, ManifestEntry, MANIFEST_FILE};
use crate::settings::{ShelfSettings, SHELF_DIR};
use crate::store::ContentStore;
use shelf_core::{Result, ShelfError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory under the build dir holding stored content
const CONTENT_DIR: &str = "content";

pub struct FsBackend {
    root: PathBuf,
    build_dir: PathBuf,
    catalog_path: PathBuf,
    catalog: AddressCatalog,
}

impl FsBackend {
    /// Open a backend rooted at a project directory, loading any saved catalog
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(root: P, build_dir: Q) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let catalog_path = root.join(SHELF_DIR).join("catalog.toml");
        let catalog = AddressCatalog::load_from_file(&catalog_path)?;
        Ok(Self {
            build_dir: build_dir.as_ref().to_path_buf(),
            root,
            catalog_path,
            catalog,
        })
    }

    pub fn from_settings(settings: &ShelfSettings) -> Result<Self> {
        Self::open(&settings.root, &settings.build_dir)
    }

    pub fn catalog(&self) -> &AddressCatalog {
        &self.catalog
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.build_dir.join(MANIFEST_FILE)
    }

    fn scan_directory(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                let is_shelf_dir = path.file_name().is_some_and(|n| n == SHELF_DIR);
                if !is_shelf_dir && path != self.build_dir {
                    self.scan_directory(&path, out)?;
                }
            } else if let Some(id) = self.resource_id(&path) {
                out.push(id);
            }
        }
        Ok(())
    }

    /// Project-relative path with `/` separators
    fn resource_id(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl AssetBackend for FsBackend {
    fn enumerate(&self, folder: &str) -> Result<Vec<String>> {
        let dir = self.root.join(folder);
        if !dir.is_dir() {
            warn!("Resource folder {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut resources = Vec::new();
        self.scan_directory(&dir, &mut resources)?;
        resources.sort();
        Ok(resources)
    }

    fn default_group(&self) -> String {
        DEFAULT_GROUP.to_string()
    }

    fn has_group(&self, name: &str) -> bool {
        self.catalog.has_group(name)
    }

    fn create_group(&mut self, name: &str) -> Result<()> {
        debug!("Creating group {}", name);
        self.catalog.add_group(name);
        Ok(())
    }

    fn assign(&mut self, resource: &str, group: &str, address: &str) -> Result<()> {
        if !self.root.join(resource).is_file() {
            return Err(ShelfError::Backend(format!("{} is not a file", resource)));
        }
        self.catalog.upsert(resource, group, address)
    }

    fn labels_of(&self, resource: &str) -> Vec<String> {
        self.catalog
            .get(resource)
            .map(|e| e.labels.clone())
            .unwrap_or_default()
    }

    fn attach_label(&mut self, resource: &str, label: &str) -> Result<()> {
        self.catalog.attach_label(resource, label)
    }

    fn persist(&mut self) -> Result<()> {
        let vanished: Vec<String> = self
            .catalog
            .entries()
            .filter(|e| !self.root.join(&e.resource).is_file())
            .map(|e| e.resource.clone())
            .collect();
        for resource in &vanished {
            info!("Dropping {} from the catalog, file no longer exists", resource);
            self.catalog.remove(resource);
        }

        self.catalog.save(&self.catalog_path)
    }

    fn package(&mut self) -> Result<()> {
        let store = ContentStore::new(self.build_dir.join(CONTENT_DIR));
        let mut entries = Vec::with_capacity(self.catalog.len());
        let mut keep = HashSet::new();

        for entry in self.catalog.entries() {
            let source = self.root.join(&entry.resource);
            let (hash, relative) = store.store(&source).map_err(|e| {
                ShelfError::Build(format!("Failed to package {}: {}", entry.resource, e))
            })?;
            keep.insert(hash);

            let stored = Path::new(CONTENT_DIR).join(relative);
            entries.push(ManifestEntry {
                address: entry.address.clone(),
                resource: entry.resource.clone(),
                group: entry.group.clone(),
                labels: entry.labels.clone(),
                content_hash: hash.to_prefixed_hex(),
                stored_path: stored.to_string_lossy().replace('\\', "/"),
            });
        }

        let removed = store.prune(&keep)?;
        if removed > 0 {
            debug!("Pruned {} stale content file(s)", removed);
        }

        let manifest = BuildManifest::new(entries);
        manifest.save(&self.manifest_path())?;
        info!(
            "Packaged {} resource(s) into {}",
            manifest.entries.len(),
            self.build_dir.display()
        );
        Ok(())
    }
}

//! Fetch backend over a packaged build directory
//!
//! Reads the build manifest once at open time and serves stored content by
//! logical address, address folder, or label. File reads run on the tokio
//! runtime the fetcher was opened on.

use crate::backend::FetchBackend;
use crate::handle::{FetchHandle, HandleId};
use parking_lot::Mutex;
use shelf_address::{BuildManifest, ManifestEntry, MANIFEST_FILE};
use shelf_core::{Result, ShelfError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// One fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedAsset {
    /// The fetch this asset came from; unloading the asset releases from it
    pub handle: HandleId,
    pub address: String,
    pub resource: String,
    pub labels: Vec<String>,
    pub bytes: Arc<Vec<u8>>,
}

impl PackagedAsset {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct PackagedFetcher {
    build_dir: PathBuf,
    manifest: Arc<BuildManifest>,
    runtime: Handle,
    /// Addresses still held by each live handle
    live: Arc<Mutex<HashMap<HandleId, Vec<String>>>>,
}

impl PackagedFetcher {
    /// Open a build directory on the current tokio runtime
    pub fn open<P: AsRef<Path>>(build_dir: P) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ShelfError::Load(format!("No tokio runtime available: {}", e)))?;
        Self::open_with_runtime(build_dir, runtime)
    }

    pub fn open_with_runtime<P: AsRef<Path>>(build_dir: P, runtime: Handle) -> Result<Self> {
        let build_dir = build_dir.as_ref().to_path_buf();
        let manifest_path = build_dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(ShelfError::Load(format!(
                "No build manifest at {}; run a build first",
                manifest_path.display()
            )));
        }
        let manifest = BuildManifest::load(&manifest_path)?;
        debug!(
            "Opened build from {} with {} entries",
            manifest.built_at,
            manifest.entries.len()
        );

        Ok(Self {
            build_dir,
            manifest: Arc::new(manifest),
            runtime,
            live: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Number of handles still holding assets
    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    fn track(&self, id: HandleId, entries: &[ManifestEntry]) {
        let addresses = entries.iter().map(|e| e.address.clone()).collect();
        self.live.lock().insert(id, addresses);
    }
}

async fn read_entry(
    build_dir: &Path,
    handle: HandleId,
    entry: ManifestEntry,
) -> std::result::Result<PackagedAsset, String> {
    let path = build_dir.join(&entry.stored_path);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(PackagedAsset {
        handle,
        address: entry.address,
        resource: entry.resource,
        labels: entry.labels,
        bytes: Arc::new(bytes),
    })
}

impl FetchBackend for PackagedFetcher {
    type Asset = PackagedAsset;

    fn fetch(&self, key: &str) -> FetchHandle<PackagedAsset> {
        let Some(entry) = self.manifest.by_address(key).cloned() else {
            return FetchHandle::failed(format!("no asset with address '{}'", key));
        };

        let (handle, completer) = FetchHandle::pending();
        self.track(handle.id(), std::slice::from_ref(&entry));

        let build_dir = self.build_dir.clone();
        let id = handle.id();
        self.runtime.spawn(async move {
            match read_entry(&build_dir, id, entry).await {
                Ok(asset) => completer.succeed(asset),
                Err(reason) => completer.fail(reason),
            }
        });
        handle
    }

    fn fetch_many(&self, key: &str) -> FetchHandle<Vec<PackagedAsset>> {
        let entries: Vec<ManifestEntry> = self.manifest.select(key).into_iter().cloned().collect();
        let (handle, completer) = FetchHandle::pending();
        self.track(handle.id(), &entries);

        let build_dir = self.build_dir.clone();
        let id = handle.id();
        self.runtime.spawn(async move {
            let total = entries.len();
            let mut assets = Vec::with_capacity(total);
            for (done, entry) in entries.into_iter().enumerate() {
                if completer.is_abandoned() {
                    return;
                }
                match read_entry(&build_dir, id, entry).await {
                    Ok(asset) => assets.push(asset),
                    Err(reason) => return completer.fail(reason),
                }
                completer.report_progress((done + 1) as f32 / total as f32);
            }
            completer.succeed(assets);
        });
        handle
    }

    fn release(&self, handle: HandleId) -> bool {
        self.live.lock().remove(&handle).is_some()
    }

    fn release_asset(&self, asset: &PackagedAsset) -> bool {
        let mut live = self.live.lock();
        let Some(addresses) = live.get_mut(&asset.handle) else {
            warn!(
                "Release of '{}' whose handle {} is no longer live",
                asset.address, asset.handle
            );
            return false;
        };
        let Some(pos) = addresses.iter().position(|a| *a == asset.address) else {
            warn!("Release of '{}' which handle {} does not hold", asset.address, asset.handle);
            return false;
        };

        addresses.remove(pos);
        if addresses.is_empty() {
            live.remove(&asset.handle);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_address::ContentStore;
    use std::fs;

    /// Lay out a build dir by hand: two stored files and a manifest
    fn build_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shelf_test_{}", uuid::Uuid::new_v4()));
        let sources = dir.join("src");
        fs::create_dir_all(&sources).unwrap();
        let store = ContentStore::new(dir.join("build/content"));

        let mut entries = Vec::new();
        for (address, labels, content) in [
            ("icons/sword", vec!["weapons"], "sword"),
            ("ui/button", vec!["ui"], "button"),
        ] {
            let source = sources.join(format!("{}.png", address.replace('/', "_")));
            fs::write(&source, content).unwrap();
            let (hash, relative) = store.store(&source).unwrap();
            entries.push(ManifestEntry {
                address: address.to_string(),
                resource: format!("Assets/{}.png", address),
                group: "png".to_string(),
                labels: labels.into_iter().map(String::from).collect(),
                content_hash: hash.to_prefixed_hex(),
                stored_path: format!("content/{}", relative.to_string_lossy().replace('\\', "/")),
            });
        }
        BuildManifest::new(entries)
            .save(&dir.join("build").join(MANIFEST_FILE))
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_fetch_by_address() {
        let dir = build_dir();
        let fetcher = PackagedFetcher::open(dir.join("build")).unwrap();

        let handle = fetcher.fetch("icons/sword");
        assert_eq!(fetcher.live_handles(), 1);
        handle.completed().await;
        let asset = handle.result().unwrap();
        assert_eq!(asset.bytes.as_slice(), b"sword");
        assert_eq!(asset.labels, vec!["weapons"]);

        assert!(fetcher.release(handle.id()));
        assert!(!fetcher.release(handle.id()));
        assert_eq!(fetcher.live_handles(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_many_by_label_and_folder() {
        let dir = build_dir();
        let fetcher = PackagedFetcher::open(dir.join("build")).unwrap();

        let handle = fetcher.fetch_many("ui");
        handle.completed().await;
        let assets = handle.result().unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].address, "ui/button");
        assert_eq!(handle.progress(), 1.0);

        let handle = fetcher.fetch_many("icons");
        handle.completed().await;
        let assets = handle.result().unwrap();
        assert!(fetcher.release_asset(&assets[0]));
        assert!(!fetcher.release_asset(&assets[0]));

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_release_asset_targets_its_own_handle() {
        let dir = build_dir();
        let fetcher = PackagedFetcher::open(dir.join("build")).unwrap();

        let kept = fetcher.fetch("icons/sword");
        kept.completed().await;
        let other = fetcher.fetch("icons/sword");
        other.completed().await;
        let asset = other.result().unwrap();
        assert_eq!(asset.handle, other.id());
        assert_eq!(fetcher.live_handles(), 2);

        assert!(fetcher.release_asset(&asset));
        assert!(!fetcher.release_asset(&asset));
        assert!(fetcher.release(kept.id()));
        assert_eq!(fetcher.live_handles(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unknown_address_fails_immediately() {
        let dir = build_dir();
        let fetcher = PackagedFetcher::open(dir.join("build")).unwrap();

        let handle = fetcher.fetch("nope");
        assert!(handle.is_done());
        assert!(handle.error().is_some());
        assert_eq!(fetcher.live_handles(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_open_requires_manifest() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = std::env::temp_dir().join(format!("shelf_test_{}", uuid::Uuid::new_v4()));
        assert!(PackagedFetcher::open_with_runtime(&dir, runtime.handle().clone()).is_err());
        assert!(PackagedFetcher::open(&dir).is_err());
    }
}

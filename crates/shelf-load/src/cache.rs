//! Per-path retention policies on top of the loader

use crate::backend::FetchBackend;
use crate::facade::Loader;
use crate::handle::HandleId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Fetch on every load; the caller owns the handle
    #[default]
    None,
    /// Fetch on every load and release the handle as soon as the value is captured
    AutoRelease,
    /// Fetch once and serve the cached value until unloaded
    KeepInMemory,
}

struct CacheEntry<T> {
    handle: HandleId,
    value: T,
}

/// Explicit cache of loaded assets keyed by logical path.
///
/// Entries exist only for paths under [`CachePolicy::KeepInMemory`] and are
/// never evicted on their own. The maps are guarded by a mutex that is never
/// held across an await, so two concurrent first loads of one path may both
/// fetch; the later one releases its own handle and returns the cached value.
pub struct HandleCache<B: FetchBackend> {
    loader: Arc<Loader<B>>,
    policies: Mutex<HashMap<String, CachePolicy>>,
    entries: Mutex<HashMap<String, CacheEntry<B::Asset>>>,
}

impl<B: FetchBackend> HandleCache<B> {
    pub fn new(loader: Arc<Loader<B>>) -> Self {
        Self {
            loader,
            policies: Mutex::new(HashMap::new()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &Arc<Loader<B>> {
        &self.loader
    }

    /// Register or overwrite the policy for a path. Existing entries are left alone.
    pub fn set_policy(&self, path: &str, policy: CachePolicy) {
        self.policies.lock().insert(path.to_string(), policy);
    }

    pub fn policy(&self, path: &str) -> CachePolicy {
        self.policies.lock().get(path).copied().unwrap_or_default()
    }

    /// Load a path under its registered policy; failures are reported and give `None`
    pub async fn load_with_policy(&self, path: &str) -> Option<B::Asset> {
        let policy = self.policy(path);

        if policy == CachePolicy::KeepInMemory {
            if let Some(entry) = self.entries.lock().get(path) {
                return Some(entry.value.clone());
            }
        }

        let (handle, value) = self.loader.load_tracked(path).await?;

        match policy {
            CachePolicy::None => {}
            CachePolicy::AutoRelease => {
                self.loader.backend().release(handle);
            }
            CachePolicy::KeepInMemory => {
                let mut entries = self.entries.lock();
                if let Some(existing) = entries.get(path) {
                    let cached = existing.value.clone();
                    drop(entries);
                    debug!("'{}' was cached while loading, releasing duplicate", path);
                    self.loader.backend().release(handle);
                    return Some(cached);
                }
                entries.insert(
                    path.to_string(),
                    CacheEntry {
                        handle,
                        value: value.clone(),
                    },
                );
            }
        }

        Some(value)
    }

    /// Release and forget the cached entry for a path; false if there was none
    pub fn unload(&self, path: &str) -> bool {
        let entry = self.entries.lock().remove(path);
        match entry {
            Some(entry) => {
                self.loader.backend().release(entry.handle);
                true
            }
            None => false,
        }
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Release every cached handle and drop all policies
    pub fn clear(&self) {
        let entries: Vec<_> = self.entries.lock().drain().collect();
        for (_, entry) in entries {
            self.loader.backend().release(entry.handle);
        }
        self.policies.lock().clear();
    }
}

//! In-memory fetch backend for tests

use crate::backend::FetchBackend;
use crate::handle::{FetchCompleter, FetchHandle, HandleId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct MockState {
    fetches: usize,
    issued: HashSet<HandleId>,
    releases: Vec<HandleId>,
    released_assets: Vec<String>,
    held_one: Vec<(String, FetchCompleter<String>)>,
    held_many: Vec<(String, FetchCompleter<Vec<String>>)>,
}

/// Fetch backend serving string assets from a fixed table.
///
/// Every fetch and release is counted. With [`MockFetcher::holding`], fetches
/// stay pending until [`MockFetcher::complete_all`] resolves them.
#[derive(Default)]
pub struct MockFetcher {
    assets: HashMap<String, String>,
    groups: HashMap<String, Vec<String>>,
    failures: HashMap<String, String>,
    hold: bool,
    state: Mutex<MockState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, key: &str, value: &str) -> Self {
        self.assets.insert(key.to_string(), value.to_string());
        self
    }

    /// Register the assets a folder or label key expands to
    pub fn with_group(mut self, key: &str, values: &[&str]) -> Self {
        self.groups
            .insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn failing(mut self, key: &str, reason: &str) -> Self {
        self.failures.insert(key.to_string(), reason.to_string());
        self
    }

    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    pub fn releases(&self) -> Vec<HandleId> {
        self.state.lock().releases.clone()
    }

    pub fn released_assets(&self) -> Vec<String> {
        self.state.lock().released_assets.clone()
    }

    /// Ids of the fetches still held pending
    pub fn held(&self) -> Vec<HandleId> {
        let state = self.state.lock();
        state
            .held_one
            .iter()
            .map(|(_, completer)| completer.id())
            .chain(state.held_many.iter().map(|(_, completer)| completer.id()))
            .collect()
    }

    /// Report progress on every held fetch
    pub fn advance(&self, progress: f32) {
        let state = self.state.lock();
        for (_, completer) in &state.held_one {
            completer.report_progress(progress);
        }
        for (_, completer) in &state.held_many {
            completer.report_progress(progress);
        }
    }

    /// Resolve every held fetch
    pub fn complete_all(&self) {
        let (one, many) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.held_one),
                std::mem::take(&mut state.held_many),
            )
        };
        for (key, completer) in one {
            match self.lookup(&key) {
                Ok(value) => completer.succeed(value),
                Err(reason) => completer.fail(reason),
            }
        }
        for (key, completer) in many {
            match self.lookup_many(&key) {
                Ok(values) => completer.succeed(values),
                Err(reason) => completer.fail(reason),
            }
        }
    }

    fn lookup(&self, key: &str) -> Result<String, String> {
        if let Some(reason) = self.failures.get(key) {
            return Err(reason.clone());
        }
        self.assets
            .get(key)
            .cloned()
            .ok_or_else(|| format!("no asset at '{}'", key))
    }

    fn lookup_many(&self, key: &str) -> Result<Vec<String>, String> {
        if let Some(reason) = self.failures.get(key) {
            return Err(reason.clone());
        }
        Ok(self.groups.get(key).cloned().unwrap_or_default())
    }
}

impl FetchBackend for MockFetcher {
    type Asset = String;

    fn fetch(&self, key: &str) -> FetchHandle<String> {
        let (handle, completer) = FetchHandle::pending();
        let mut state = self.state.lock();
        state.fetches += 1;
        state.issued.insert(handle.id());

        if self.hold {
            state.held_one.push((key.to_string(), completer));
        } else {
            match self.lookup(key) {
                Ok(value) => completer.succeed(value),
                Err(reason) => completer.fail(reason),
            }
        }
        handle
    }

    fn fetch_many(&self, key: &str) -> FetchHandle<Vec<String>> {
        let (handle, completer) = FetchHandle::pending();
        let mut state = self.state.lock();
        state.fetches += 1;
        state.issued.insert(handle.id());

        if self.hold {
            state.held_many.push((key.to_string(), completer));
        } else {
            match self.lookup_many(key) {
                Ok(values) => completer.succeed(values),
                Err(reason) => completer.fail(reason),
            }
        }
        handle
    }

    fn release(&self, handle: HandleId) -> bool {
        let mut state = self.state.lock();
        state.releases.push(handle);
        state.issued.contains(&handle)
    }

    fn release_asset(&self, asset: &String) -> bool {
        let mut state = self.state.lock();
        state.released_assets.push(asset.clone());
        self.assets.values().any(|v| v == asset)
            || self.groups.values().flatten().any(|v| v == asset)
    }
}

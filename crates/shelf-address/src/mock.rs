//! In-memory backend for tests
//!
//! Records every call so tests can assert on exactly what the assigner and
//! orchestrator asked for, and can be told to fail at specific points.

use crate::backend::AssetBackend;
use shelf_core::{Result, ShelfError};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// A call made against [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Enumerate(String),
    CreateGroup(String),
    Assign {
        resource: String,
        group: String,
        address: String,
    },
    AttachLabel(String, String),
    Persist,
    Package,
}

/// What the mock holds for one assigned resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockEntry {
    pub group: String,
    pub address: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    calls: RefCell<Vec<BackendCall>>,
    resources: BTreeMap<String, Vec<String>>,
    groups: BTreeSet<String>,
    entries: BTreeMap<String, MockEntry>,
    fail_assign: Option<String>,
    fail_persist: bool,
    fail_package: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(mut self, folder: &str, resources: &[&str]) -> Self {
        self.resources
            .entry(folder.to_string())
            .or_default()
            .extend(resources.iter().map(|r| r.to_string()));
        self
    }

    pub fn with_group(mut self, name: &str) -> Self {
        self.groups.insert(name.to_string());
        self
    }

    pub fn with_label(mut self, resource: &str, label: &str) -> Self {
        self.entries
            .entry(resource.to_string())
            .or_default()
            .labels
            .push(label.to_string());
        self
    }

    /// Reject the assignment of one resource
    pub fn failing_assign(mut self, resource: &str) -> Self {
        self.fail_assign = Some(resource.to_string());
        self
    }

    pub fn failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    pub fn failing_package(mut self) -> Self {
        self.fail_package = true;
        self
    }

    pub fn entry(&self, resource: &str) -> Option<&MockEntry> {
        self.entries.get(resource).filter(|e| !e.address.is_empty())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Number of recorded calls matching a predicate
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl AssetBackend for MockBackend {
    fn enumerate(&self, folder: &str) -> Result<Vec<String>> {
        self.record(BackendCall::Enumerate(folder.to_string()));
        Ok(self.resources.get(folder).cloned().unwrap_or_default())
    }

    fn default_group(&self) -> String {
        "Default".to_string()
    }

    fn has_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    fn create_group(&mut self, name: &str) -> Result<()> {
        self.record(BackendCall::CreateGroup(name.to_string()));
        self.groups.insert(name.to_string());
        Ok(())
    }

    fn assign(&mut self, resource: &str, group: &str, address: &str) -> Result<()> {
        if self.fail_assign.as_deref() == Some(resource) {
            return Err(ShelfError::Backend(format!("{} is locked", resource)));
        }
        self.record(BackendCall::Assign {
            resource: resource.to_string(),
            group: group.to_string(),
            address: address.to_string(),
        });
        let entry = self.entries.entry(resource.to_string()).or_default();
        entry.group = group.to_string();
        entry.address = address.to_string();
        Ok(())
    }

    fn labels_of(&self, resource: &str) -> Vec<String> {
        self.entries
            .get(resource)
            .map(|e| e.labels.clone())
            .unwrap_or_default()
    }

    fn attach_label(&mut self, resource: &str, label: &str) -> Result<()> {
        self.record(BackendCall::AttachLabel(resource.to_string(), label.to_string()));
        self.entries
            .entry(resource.to_string())
            .or_default()
            .labels
            .push(label.to_string());
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        if self.fail_persist {
            return Err(ShelfError::Backend("disk full".to_string()));
        }
        self.record(BackendCall::Persist);
        Ok(())
    }

    fn package(&mut self) -> Result<()> {
        if self.fail_package {
            return Err(ShelfError::Build("bundle compiler crashed".to_string()));
        }
        self.record(BackendCall::Package);
        Ok(())
    }
}

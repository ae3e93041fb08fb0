//! Configuration fingerprints for change-gated builds

use crate::config::AddressConfig;
use shelf_core::ContentHash;
use std::fmt;

/// Deterministic digest of an [`AddressConfig`].
///
/// Stored in the preference store after a successful build and compared on the
/// next run to decide whether assignment and packaging must happen again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a configuration: every folder in order, then every rule's
    /// `(folder, group_name, kind, custom_label)` in order.
    pub fn of(config: &AddressConfig) -> Self {
        let folders = config.folders.iter().cloned();
        let rules = config.rules.iter().flat_map(|rule| {
            [
                rule.folder.clone(),
                rule.group_name.clone(),
                rule.kind.to_string(),
                rule.custom_label.clone(),
            ]
        });
        // The folder count keeps a folder from being read as the start of a rule.
        let header = std::iter::once(config.folders.len().to_string());

        Self(ContentHash::from_fields(header.chain(folders).chain(rules)).to_prefixed_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a previously stored fingerprint still matches
    pub fn matches(&self, stored: &str) -> bool {
        self.0 == stored
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

/// Decide whether a rebuild is needed.
///
/// True when nothing was stored yet, the stored value is empty, or it differs
/// from the current configuration's fingerprint.
pub fn should_rebuild(config: &AddressConfig, last: Option<&str>) -> bool {
    match last {
        Some(stored) if !stored.is_empty() => !Fingerprint::of(config).matches(stored),
        _ => true,
    }
}

//! Shelf Address - build-time address assignment for addressable resources
//!
//! Reads a declarative grouping config, assigns every resource under the
//! configured folders a logical address, a group, and optionally a label, and
//! skips the whole pass when the config fingerprint has not changed since the
//! last successful build.

mod assigner;
mod backend;
mod catalog;
mod config;
mod fingerprint;
mod fs_backend;
mod manifest;
pub mod mock;
mod orchestrator;
mod prefs;
mod resolver;
mod settings;
mod store;

pub use assigner::{
    logical_address, AddressAssigner, AssignmentFailure, AssignmentPlan, AssignmentRecord,
    AssignmentReport,
};
pub use backend::AssetBackend;
pub use catalog::{AddressCatalog, CatalogEntry, DEFAULT_GROUP};
pub use config::{
    normalize_folder, AddressConfig, ConfigStore, GroupingKind, GroupingRule, MemoryConfigStore,
    TomlConfigStore,
};
pub use fingerprint::{should_rebuild, Fingerprint};
pub use fs_backend::FsBackend;
pub use manifest::{BuildManifest, ManifestEntry, MANIFEST_FILE};
pub use orchestrator::{BuildFailure, BuildOrchestrator, BuildOutcome, BuildStatus};
pub use prefs::{
    MemoryPreferenceStore, PreferenceStore, TomlPreferenceStore, LAST_BUILD_TIME_KEY,
    LAST_FINGERPRINT_KEY,
};
pub use resolver::{GroupResolver, GroupTarget, Resolution, ROOT_SUBFOLDER};
pub use settings::{FailurePolicy, SettingsFile, ShelfSettings, SHELF_DIR};
pub use store::ContentStore;

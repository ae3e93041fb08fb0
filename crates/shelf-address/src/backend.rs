//! The asset distribution backend the build side drives

use shelf_core::Result;

/// Storage and packaging primitives consumed by the assigner and the orchestrator.
///
/// Resources are identified by their project-relative path. Nothing here is
/// persisted until [`AssetBackend::persist`] is called.
pub trait AssetBackend {
    /// All resource identifiers under a folder, directories excluded
    fn enumerate(&self, folder: &str) -> Result<Vec<String>>;

    /// Name of the group resources land in when no rule picks one
    fn default_group(&self) -> String;

    /// Look up a group by name
    fn has_group(&self, name: &str) -> bool;

    fn create_group(&mut self, name: &str) -> Result<()>;

    /// Place or move a resource into a group under a logical address
    fn assign(&mut self, resource: &str, group: &str, address: &str) -> Result<()>;

    fn labels_of(&self, resource: &str) -> Vec<String>;

    fn attach_label(&mut self, resource: &str, label: &str) -> Result<()>;

    /// Commit every pending assignment in one call
    fn persist(&mut self) -> Result<()>;

    /// Build the distributable content
    fn package(&mut self) -> Result<()>;
}

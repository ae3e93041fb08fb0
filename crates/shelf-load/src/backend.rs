//! The asynchronous fetch side of the asset backend

use crate::handle::{FetchHandle, HandleId};

/// Something that can fetch assets by logical key and release them again.
///
/// Fetches return immediately with a handle; the backend resolves it later.
/// Release calls for unknown handles or assets must be harmless.
pub trait FetchBackend: Send + Sync {
    type Asset: Clone + Send + Sync + 'static;

    /// Fetch one asset by logical address
    fn fetch(&self, key: &str) -> FetchHandle<Self::Asset>;

    /// Fetch every asset under an address folder or carrying a label
    fn fetch_many(&self, key: &str) -> FetchHandle<Vec<Self::Asset>>;

    /// Release everything a handle still holds; false if the handle is unknown
    fn release(&self, handle: HandleId) -> bool;

    /// Release one previously fetched asset; false if it is not tracked
    fn release_asset(&self, asset: &Self::Asset) -> bool;
}

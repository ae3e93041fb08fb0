//! Shelf Load - asynchronous loading of addressed assets
//!
//! Fetches assets by logical address, address folder, or label through a
//! [`FetchBackend`], with progress reporting, cooperative cancellation, and an
//! optional per-path retention cache.

mod backend;
mod cache;
mod error;
mod facade;
mod handle;
pub mod mock;
mod packaged;

pub use backend::FetchBackend;
pub use cache::{CachePolicy, HandleCache};
pub use error::{LoadError, LoadOutcome};
pub use facade::{ErrorCallback, Loader};
pub use handle::{FetchCompleter, FetchHandle, FetchStatus, HandleId};
pub use packaged::{PackagedAsset, PackagedFetcher};
pub use tokio_util::sync::CancellationToken;

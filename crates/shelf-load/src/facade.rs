//! Load facade
//!
//! [`Loader`] drives a [`FetchBackend`] for single assets, folders and labels.
//! The `try_*` operations return a typed result; the plain operations report
//! failures through the failure channel (an `error!` event plus the optional
//! callback registered with [`Loader::on_error`]) and hand back an absent or
//! empty value instead.
//!
//! Cancellation is cooperative and observed between wake-ups. A cancelled load
//! releases its handle exactly once and is not reported as a failure; the
//! backend may still finish the work in the background.

use crate::backend::FetchBackend;
use crate::error::{LoadError, LoadOutcome};
use crate::handle::{FetchHandle, FetchStatus, HandleId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub type ErrorCallback = Arc<dyn Fn(&LoadError) + Send + Sync>;

enum Resolved<T> {
    Done(T),
    Failed(String),
    Cancelled,
}

/// Wait for a handle, forwarding progress, until it completes or `cancel` fires
async fn drive<T: Clone>(
    handle: &FetchHandle<T>,
    on_progress: &mut dyn FnMut(f32),
    cancel: &CancellationToken,
) -> Resolved<T> {
    let mut rx = handle.subscribe();
    let mut last_progress = None;

    loop {
        let (progress, status) = {
            let state = rx.borrow_and_update();
            (state.progress, state.status)
        };
        // User code runs with the guard released.
        if last_progress != Some(progress) {
            last_progress = Some(progress);
            on_progress(progress);
        }
        match status {
            FetchStatus::Succeeded => {
                return match rx.borrow().result.clone() {
                    Some(value) => Resolved::Done(value),
                    None => Resolved::Failed("fetch succeeded without a result".to_string()),
                };
            }
            FetchStatus::Failed => {
                let reason = rx.borrow().error.clone();
                return Resolved::Failed(reason.unwrap_or_else(|| "unknown error".to_string()));
            }
            FetchStatus::Pending => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Resolved::Cancelled,
            changed = rx.changed() => {
                if changed.is_err() {
                    return Resolved::Failed("fetch abandoned before completing".to_string());
                }
            }
        }
    }
}

pub struct Loader<B: FetchBackend> {
    backend: Arc<B>,
    on_error: Mutex<Option<ErrorCallback>>,
}

impl<B: FetchBackend> Loader<B> {
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            on_error: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Register a callback invoked for every reported load failure
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&LoadError) + Send + Sync + 'static,
    {
        *self.on_error.lock() = Some(Arc::new(callback));
    }

    fn report(&self, err: &LoadError) {
        error!("{}", err);
        let callback = self.on_error.lock().clone();
        if let Some(callback) = callback {
            callback(err);
        }
    }

    /// Turn a finished wait into an outcome, releasing the handle unless it succeeded
    fn settle<T>(
        &self,
        key: &str,
        id: HandleId,
        resolved: Resolved<T>,
    ) -> Result<LoadOutcome<T>, LoadError> {
        match resolved {
            Resolved::Done(value) => Ok(LoadOutcome::Loaded(value)),
            Resolved::Cancelled => {
                debug!("Load of '{}' cancelled", key);
                self.backend.release(id);
                Ok(LoadOutcome::Cancelled)
            }
            Resolved::Failed(reason) => {
                self.backend.release(id);
                Err(LoadError::Failed {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }

    fn reported<T>(&self, result: Result<LoadOutcome<T>, LoadError>) -> Option<T> {
        match result {
            Ok(outcome) => outcome.loaded(),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    /// Fetch one asset and keep its handle, reporting failures.
    ///
    /// Used by the cache, which needs the handle to release it later.
    pub(crate) async fn load_tracked(&self, key: &str) -> Option<(HandleId, B::Asset)> {
        let handle = self.backend.fetch(key);
        let resolved = drive(&handle, &mut |_: f32| {}, &CancellationToken::new()).await;
        let value = self.reported(self.settle(key, handle.id(), resolved))?;
        Some((handle.id(), value))
    }

    pub async fn try_load_one(&self, key: &str) -> Result<LoadOutcome<B::Asset>, LoadError> {
        self.try_load_one_with(key, |_| {}, &CancellationToken::new())
            .await
    }

    pub async fn try_load_one_with(
        &self,
        key: &str,
        mut on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome<B::Asset>, LoadError> {
        let handle = self.backend.fetch(key);
        let resolved = drive(&handle, &mut on_progress, cancel).await;
        self.settle(key, handle.id(), resolved)
    }

    pub async fn load_one(&self, key: &str) -> Option<B::Asset> {
        self.reported(self.try_load_one(key).await)
    }

    pub async fn load_one_with(
        &self,
        key: &str,
        on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Option<B::Asset> {
        self.reported(self.try_load_one_with(key, on_progress, cancel).await)
    }

    pub async fn try_load_many(&self, key: &str) -> Result<LoadOutcome<Vec<B::Asset>>, LoadError> {
        self.try_load_many_with(key, |_| {}, &CancellationToken::new())
            .await
    }

    /// Load every asset under an address folder or carrying a label.
    ///
    /// A key that matches nothing is an [`LoadError::Empty`] failure.
    pub async fn try_load_many_with(
        &self,
        key: &str,
        mut on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome<Vec<B::Asset>>, LoadError> {
        let handle = self.backend.fetch_many(key);
        let resolved = drive(&handle, &mut on_progress, cancel).await;
        match self.settle(key, handle.id(), resolved)? {
            LoadOutcome::Loaded(assets) if assets.is_empty() => {
                self.backend.release(handle.id());
                Err(LoadError::Empty {
                    key: key.to_string(),
                })
            }
            outcome => Ok(outcome),
        }
    }

    pub async fn load_many(&self, key: &str) -> Vec<B::Asset> {
        self.reported(self.try_load_many(key).await)
            .unwrap_or_default()
    }

    pub async fn load_many_with(
        &self,
        key: &str,
        on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Vec<B::Asset> {
        self.reported(self.try_load_many_with(key, on_progress, cancel).await)
            .unwrap_or_default()
    }

    pub async fn try_load_first(&self, label: &str) -> Result<LoadOutcome<B::Asset>, LoadError> {
        self.try_load_first_with(label, |_| {}, &CancellationToken::new())
            .await
    }

    /// Load the first asset carrying a label; the other matches are released
    pub async fn try_load_first_with(
        &self,
        label: &str,
        on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome<B::Asset>, LoadError> {
        let assets = match self.try_load_many_with(label, on_progress, cancel).await? {
            LoadOutcome::Loaded(assets) => assets,
            LoadOutcome::Cancelled => return Ok(LoadOutcome::Cancelled),
        };

        let mut assets = assets.into_iter();
        let first = assets.next().ok_or_else(|| LoadError::Empty {
            key: label.to_string(),
        })?;
        for rest in assets {
            self.backend.release_asset(&rest);
        }
        Ok(LoadOutcome::Loaded(first))
    }

    pub async fn load_first(&self, label: &str) -> Option<B::Asset> {
        self.reported(self.try_load_first(label).await)
    }

    pub async fn load_first_with(
        &self,
        label: &str,
        on_progress: impl FnMut(f32),
        cancel: &CancellationToken,
    ) -> Option<B::Asset> {
        self.reported(self.try_load_first_with(label, on_progress, cancel).await)
    }

    /// Blocking [`Loader::load_one`]; must not be called from inside an async task
    pub fn load_one_blocking(&self, key: &str) -> Option<B::Asset> {
        futures::executor::block_on(self.load_one(key))
    }

    /// Blocking [`Loader::load_many`]; must not be called from inside an async task
    pub fn load_many_blocking(&self, key: &str) -> Vec<B::Asset> {
        futures::executor::block_on(self.load_many(key))
    }

    /// Blocking [`Loader::load_first`]; must not be called from inside an async task
    pub fn load_first_blocking(&self, label: &str) -> Option<B::Asset> {
        futures::executor::block_on(self.load_first(label))
    }

    /// Release a loaded asset. Absent or untracked assets are ignored.
    pub fn unload(&self, asset: Option<&B::Asset>) -> bool {
        let Some(asset) = asset else {
            return false;
        };
        let released = self.backend.release_asset(asset);
        if !released {
            debug!("Ignoring unload of an untracked asset");
        }
        released
    }

    /// Release several assets; returns how many were tracked
    pub fn unload_many(&self, assets: &[B::Asset]) -> usize {
        assets
            .iter()
            .filter(|asset| self.unload(Some(asset)))
            .count()
    }

    pub fn unload_handle(&self, handle: HandleId) -> bool {
        let released = self.backend.release(handle);
        if !released {
            debug!("Ignoring unload of unknown handle {}", handle);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFetcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing_test::traced_test;

    fn loader() -> Loader<MockFetcher> {
        Loader::new(
            MockFetcher::new()
                .with_asset("icons/sword", "sword-bytes")
                .with_group("ui", &["button-bytes", "panel-bytes"])
                .with_group("icons", &["sword-bytes"])
                .failing("broken", "disk on fire"),
        )
    }

    #[tokio::test]
    async fn test_load_one() {
        let loader = loader();
        assert_eq!(loader.load_one("icons/sword").await.as_deref(), Some("sword-bytes"));
        assert!(loader.backend().releases().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_is_reported_not_raised() {
        let loader = loader();
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        loader.on_error(move |err| {
            assert_eq!(err.key(), "broken");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(loader.load_one("broken").await, None);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert!(logs_contain("disk on fire"));
        // Failed handles are released
        assert_eq!(loader.backend().releases().len(), 1);
    }

    #[tokio::test]
    async fn test_try_load_one_failure() {
        let loader = loader();
        let err = loader.try_load_one("nowhere").await.unwrap_err();
        assert!(matches!(err, LoadError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_load_many_and_first() {
        let loader = loader();
        assert_eq!(loader.load_many("ui").await, vec!["button-bytes", "panel-bytes"]);

        let first = loader.load_first("ui").await;
        assert_eq!(first.as_deref(), Some("button-bytes"));
        assert_eq!(loader.backend().released_assets(), vec!["panel-bytes"]);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let loader = loader();
        let err = loader.try_load_many("nothing").await.unwrap_err();
        assert_eq!(
            err,
            LoadError::Empty {
                key: "nothing".to_string()
            }
        );
        assert!(loader.load_many("nothing").await.is_empty());
        assert_eq!(loader.load_first("nothing").await, None);
    }

    #[tokio::test]
    async fn test_cancellation_releases_exactly_once() {
        let loader = Loader::new(MockFetcher::new().with_asset("big", "data").holding());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let outcome = loader
            .try_load_one_with("big", |_| {}, &cancel)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        let in_flight = loader.backend().held();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(loader.backend().releases(), in_flight);

        // Completing after cancellation changes nothing for the caller
        loader.backend().complete_all();
        assert_eq!(loader.backend().releases().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let loader = loader();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let held = Loader::new(MockFetcher::new().with_group("ui", &["a"]).holding());
        assert_eq!(held.load_first_with("ui", |_| {}, &cancel).await, None);
        assert_eq!(held.backend().releases().len(), 1);

        // A completed fetch wins over a cancelled token
        assert!(loader
            .load_one_with("icons/sword", |_| {}, &cancel)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let loader = Loader::new(MockFetcher::new().with_asset("big", "data").holding());
        let backend = loader.backend().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            backend.advance(0.5);
            tokio::time::sleep(Duration::from_millis(10)).await;
            backend.complete_all();
        });

        let mut seen = Vec::new();
        let value = loader
            .load_one_with("big", |p| seen.push(p), &CancellationToken::new())
            .await;
        assert_eq!(value.as_deref(), Some("data"));
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn test_progress_callback_may_drive_the_fetch() {
        let loader = Loader::new(MockFetcher::new().with_asset("big", "data").holding());
        let backend = loader.backend().clone();

        let mut seen = Vec::new();
        let value = loader
            .load_one_with(
                "big",
                |p| {
                    seen.push(p);
                    if p < 0.5 {
                        backend.advance(0.5);
                    } else {
                        backend.complete_all();
                    }
                },
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(value.as_deref(), Some("data"));
        assert_eq!(seen, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_blocking_variants() {
        let loader = loader();
        assert_eq!(loader.load_one_blocking("icons/sword").as_deref(), Some("sword-bytes"));
        assert_eq!(loader.load_many_blocking("icons").len(), 1);
        assert_eq!(loader.load_first_blocking("ui").as_deref(), Some("button-bytes"));
        assert_eq!(loader.load_one_blocking("broken"), None);
    }

    #[test]
    fn test_unload_never_faults() {
        let loader = loader();
        assert!(!loader.unload(None));
        assert!(!loader.unload(Some(&"unknown".to_string())));
        assert!(loader.unload(Some(&"sword-bytes".to_string())));
        assert_eq!(
            loader.unload_many(&["sword-bytes".to_string(), "nope".to_string()]),
            1
        );
        assert!(!loader.unload_handle(HandleId::new()));
    }
}

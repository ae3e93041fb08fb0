//! Fetch handles
//!
//! A [`FetchHandle`] is the caller's view of one in-flight fetch; the matching
//! [`FetchCompleter`] is held by whoever does the work. State changes are pushed
//! through a `watch` channel so waiters wake on progress and completion instead
//! of polling.

use std::fmt;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub(crate) struct HandleState<T> {
    pub(crate) status: FetchStatus,
    pub(crate) progress: f32,
    pub(crate) result: Option<T>,
    pub(crate) error: Option<String>,
}

impl<T> HandleState<T> {
    fn pending() -> Self {
        Self {
            status: FetchStatus::Pending,
            progress: 0.0,
            result: None,
            error: None,
        }
    }

    fn succeeded(value: T) -> Self {
        Self {
            status: FetchStatus::Succeeded,
            progress: 1.0,
            result: Some(value),
            error: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            status: FetchStatus::Failed,
            progress: 1.0,
            result: None,
            error: Some(reason),
        }
    }
}

/// Caller side of a fetch
#[derive(Debug)]
pub struct FetchHandle<T> {
    id: HandleId,
    rx: watch::Receiver<HandleState<T>>,
}

impl<T> Clone for FetchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: self.rx.clone(),
        }
    }
}

impl<T> FetchHandle<T> {
    /// A pending handle and the completer that resolves it
    pub fn pending() -> (Self, FetchCompleter<T>) {
        let id = HandleId::new();
        let (tx, rx) = watch::channel(HandleState::pending());
        (Self { id, rx }, FetchCompleter { id, tx })
    }

    /// An already-succeeded handle
    pub fn ready(value: T) -> Self {
        let (tx, rx) = watch::channel(HandleState::succeeded(value));
        drop(tx);
        Self {
            id: HandleId::new(),
            rx,
        }
    }

    /// An already-failed handle
    pub fn failed(reason: impl Into<String>) -> Self {
        let (tx, rx) = watch::channel(HandleState::failed(reason.into()));
        drop(tx);
        Self {
            id: HandleId::new(),
            rx,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn status(&self) -> FetchStatus {
        self.rx.borrow().status
    }

    /// Progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        self.rx.borrow().progress
    }

    pub fn is_done(&self) -> bool {
        self.status() != FetchStatus::Pending
    }

    pub fn error(&self) -> Option<String> {
        self.rx.borrow().error.clone()
    }

    /// Wait until the fetch leaves [`FetchStatus::Pending`]
    pub async fn completed(&self) -> FetchStatus {
        let mut rx = self.rx.clone();
        let status = match rx.wait_for(|s| s.status != FetchStatus::Pending).await {
            Ok(state) => state.status,
            Err(_) => FetchStatus::Failed,
        };
        status
    }

    /// Block the current thread until the fetch completes.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_blocking(&self) -> FetchStatus {
        futures::executor::block_on(self.completed())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<HandleState<T>> {
        self.rx.clone()
    }
}

impl<T: Clone> FetchHandle<T> {
    /// The fetched value, once succeeded
    pub fn result(&self) -> Option<T> {
        self.rx.borrow().result.clone()
    }
}

/// Worker side of a fetch.
///
/// Dropping a completer that never resolved fails its handle.
#[derive(Debug)]
pub struct FetchCompleter<T> {
    id: HandleId,
    tx: watch::Sender<HandleState<T>>,
}

impl<T> FetchCompleter<T> {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Whether every handle for this fetch has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn report_progress(&self, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        self.tx.send_if_modified(|state| {
            if state.status != FetchStatus::Pending || state.progress == progress {
                return false;
            }
            state.progress = progress;
            true
        });
    }

    pub fn succeed(self, value: T) {
        self.tx.send_replace(HandleState::succeeded(value));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.tx.send_replace(HandleState::failed(reason.into()));
    }
}

impl<T> Drop for FetchCompleter<T> {
    fn drop(&mut self) {
        self.tx.send_if_modified(|state| {
            if state.status != FetchStatus::Pending {
                return false;
            }
            *state = HandleState::failed("fetch abandoned before completing".to_string());
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_and_failed() {
        let ready = FetchHandle::ready(7);
        assert!(ready.is_done());
        assert_eq!(ready.status(), FetchStatus::Succeeded);
        assert_eq!(ready.result(), Some(7));

        let failed: FetchHandle<i32> = FetchHandle::failed("missing");
        assert_eq!(failed.status(), FetchStatus::Failed);
        assert_eq!(failed.result(), None);
        assert_eq!(failed.error().as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_completion_is_pushed() {
        let (handle, completer) = FetchHandle::pending();
        assert_eq!(handle.status(), FetchStatus::Pending);
        assert_eq!(handle.id(), completer.id());

        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.completed().await });

        completer.report_progress(0.5);
        assert_eq!(handle.progress(), 0.5);
        completer.succeed("done".to_string());

        assert_eq!(task.await.unwrap(), FetchStatus::Succeeded);
        assert_eq!(handle.result().as_deref(), Some("done"));
        assert_eq!(handle.progress(), 1.0);
    }

    #[test]
    fn test_dropped_completer_fails_handle() {
        let (handle, completer) = FetchHandle::<u8>::pending();
        drop(completer);
        assert_eq!(handle.wait_blocking(), FetchStatus::Failed);
        assert!(handle.error().is_some());
    }

    #[test]
    fn test_progress_is_clamped_and_frozen_after_completion() {
        let (handle, completer) = FetchHandle::<u8>::pending();
        completer.report_progress(3.0);
        assert_eq!(handle.progress(), 1.0);

        let (handle, completer) = FetchHandle::<u8>::pending();
        completer.report_progress(0.25);
        completer.fail("io");
        assert_eq!(handle.status(), FetchStatus::Failed);
        assert_eq!(handle.progress(), 1.0);
    }

    #[test]
    fn test_abandoned_when_handles_dropped() {
        let (handle, completer) = FetchHandle::<u8>::pending();
        assert!(!completer.is_abandoned());
        drop(handle);
        assert!(completer.is_abandoned());
    }

    #[test]
    fn test_wait_blocking_across_threads() {
        let (handle, completer) = FetchHandle::pending();
        let worker = std::thread::spawn(move || completer.succeed(42u32));
        assert_eq!(handle.wait_blocking(), FetchStatus::Succeeded);
        worker.join().unwrap();
        assert_eq!(handle.result(), Some(42));
    }
}

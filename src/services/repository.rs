//! Persistence seam for the bookmark store.
//!
//! The store does not know how bookmarks are stored. It loads them once at
//! startup and afterwards hands the repository full ordered snapshots.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::bookmark::ThreadBookmark;
use crate::types::errors::PersistenceError;

/// Storage backend for bookmarks.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Loads every stored bookmark. The returned order is the initial display order.
    async fn load_all(&self) -> Result<Vec<ThreadBookmark>, PersistenceError>;

    /// Replaces everything stored with `bookmarks` (in display order). Must be idempotent.
    async fn persist(&self, bookmarks: Vec<ThreadBookmark>) -> Result<(), PersistenceError>;
}

/// Repository keeping the last persisted snapshot in memory.
///
/// Used by the demo binary and tests. Counts persist calls and can be told to
/// fail or to delay loading.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    stored: Mutex<Vec<ThreadBookmark>>,
    persist_calls: AtomicUsize,
    load_error: Mutex<Option<PersistenceError>>,
    fail_persist: AtomicBool,
    load_delay: Mutex<Option<Duration>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that already holds `bookmarks`.
    pub fn with_bookmarks(bookmarks: Vec<ThreadBookmark>) -> Self {
        let repo = Self::default();
        *repo.stored.lock() = bookmarks;
        repo
    }

    /// Makes every subsequent `load_all` fail with `err`.
    pub fn fail_loads_with(&self, err: PersistenceError) {
        *self.load_error.lock() = Some(err);
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Delays `load_all` by `delay` (Tokio time, so it can be paused in tests).
    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = Some(delay);
    }

    /// Number of `persist` calls so far, including failed ones.
    pub fn persist_count(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// The last successfully persisted snapshot.
    pub fn stored(&self) -> Vec<ThreadBookmark> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn load_all(&self) -> Result<Vec<ThreadBookmark>, PersistenceError> {
        let delay = *self.load_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let load_error = self.load_error.lock().clone();
        if let Some(err) = load_error {
            return Err(err);
        }
        Ok(self.stored.lock().clone())
    }

    async fn persist(&self, bookmarks: Vec<ThreadBookmark>) -> Result<(), PersistenceError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(PersistenceError::Persist("in-memory repository set to fail".to_string()));
        }

        debug!(count = bookmarks.len(), "in-memory repository persisted bookmarks");
        *self.stored.lock() = bookmarks;
        Ok(())
    }
}

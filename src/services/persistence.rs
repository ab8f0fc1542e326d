//! Debounced persistence.
//!
//! Mutations only bump a dirty generation. A background worker waits until the
//! generation stops changing for the quiescence window and then flushes once.
//! [`PersistenceDebouncer::flush_now`] flushes immediately (used when the app
//! goes to the background). Flushes are single-flight and skip when nothing new
//! was written since the last successful flush, so a blocking flush racing an
//! async one never writes the same generation twice.
//!
//! Persistence is best-effort: a failed flush is logged, the in-memory store
//! stays authoritative and the next mutation re-dirties the debouncer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::types::errors::PersistenceError;

/// Something that can snapshot its state and write it out.
#[async_trait]
pub trait FlushTarget: Send + Sync + 'static {
    /// Writes the current snapshot. Returns the number of records written.
    async fn flush(&self) -> Result<usize, PersistenceError>;
}

/// Result of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Persisted(usize),
    /// Nothing changed since the last successful flush.
    Clean,
    /// The target failed; the error was logged.
    Failed,
}

struct Shared {
    target: Arc<dyn FlushTarget>,
    dirty: watch::Sender<u64>,
    persisted: AtomicU64,
    flush_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    async fn flush(&self, reason: &'static str) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;

        let generation = *self.dirty.borrow();
        if self.persisted.load(Ordering::Acquire) >= generation {
            return FlushOutcome::Clean;
        }

        debug!(reason, generation, "persisting bookmarks");
        match self.target.flush().await {
            Ok(count) => {
                self.persisted.store(generation, Ordering::Release);
                debug!(reason, count, "persisting bookmarks finished");
                FlushOutcome::Persisted(count)
            }
            Err(err) => {
                error!(reason, %err, "failed to persist bookmarks");
                FlushOutcome::Failed
            }
        }
    }
}

/// Coalesces many dirty marks into a single asynchronous flush.
///
/// Must be created inside a Tokio runtime.
pub struct PersistenceDebouncer {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceDebouncer {
    pub fn new(target: Arc<dyn FlushTarget>, window: Duration) -> Self {
        let (dirty, dirty_rx) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            target,
            dirty,
            persisted: AtomicU64::new(0),
            flush_lock: tokio::sync::Mutex::new(()),
        });
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(shared.clone(), dirty_rx, window, cancel.clone()));

        Self {
            shared,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Marks the state dirty and (re)starts the quiescence window.
    pub fn mark_dirty_and_schedule_flush(&self) {
        self.shared.dirty.send_modify(|generation| *generation += 1);
    }

    /// True if a mutation happened after the last successful flush.
    pub fn is_dirty(&self) -> bool {
        *self.shared.dirty.borrow() > self.shared.persisted.load(Ordering::Acquire)
    }

    /// Flushes right away, waiting for an in-flight flush first.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.shared.flush("blocking").await
    }

    /// Stops the worker and waits for it. A pending debounced flush is not run.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl Drop for PersistenceDebouncer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    mut dirty: watch::Receiver<u64>,
    window: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = dirty.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(window) => break,
                changed = dirty.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        shared.flush("debounced").await;
    }
}

//! Change broadcasting with two delivery policies.
//!
//! - **Immediate**: every event goes to every current subscriber. Channels are
//!   bounded and producers never block; a subscriber that falls behind skips
//!   straight to the most recent event.
//! - **Debounced**: events are coalesced in a single slot and only the latest
//!   one is delivered once no new event arrived for the quiescence window.
//!
//! Subscribers only see events posted after they subscribed.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Multi-consumer event broadcaster.
///
/// Must be created inside a Tokio runtime: the debounced channel is driven by a
/// background task that lives until [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct ChangeBus<E> {
    immediate: broadcast::Sender<E>,
    debounced: broadcast::Sender<E>,
    pending: watch::Sender<Option<E>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E> ChangeBus<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, debounce: Duration) -> Self {
        let capacity = capacity.max(1);
        let (immediate, _) = broadcast::channel(capacity);
        let (debounced, _) = broadcast::channel(capacity);
        let (pending, pending_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_debouncer(
            pending_rx,
            debounced.clone(),
            debounce,
            cancel.clone(),
        ));

        Self {
            immediate,
            debounced,
            pending,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Delivers `event` to all current immediate subscribers. Never blocks.
    pub fn post_immediate(&self, event: E) {
        // No subscribers is not an error.
        let _ = self.immediate.send(event);
    }

    /// Replaces the pending debounced event and restarts the quiescence window.
    pub fn post_debounced(&self, event: E) {
        self.pending.send_replace(Some(event));
    }

    pub fn subscribe(&self) -> ChangeSubscription<E> {
        ChangeSubscription::from_receiver(self.immediate.subscribe())
    }

    pub fn subscribe_debounced(&self) -> ChangeSubscription<E> {
        ChangeSubscription::from_receiver(self.debounced.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.immediate.receiver_count()
    }

    /// Stops the debounce task and waits for it. A pending event is dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl<E> Drop for ChangeBus<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_debouncer<E>(
    mut pending: watch::Receiver<Option<E>>,
    out: broadcast::Sender<E>,
    window: Duration,
    cancel: CancellationToken,
) where
    E: Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = pending.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        // Restart the window on every new event until things go quiet.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(window) => break,
                changed = pending.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let latest = pending.borrow_and_update().clone();
        if let Some(event) = latest {
            debug!(subscribers = out.receiver_count(), "delivering debounced change");
            let _ = out.send(event);
        }
    }
}

/// Receiving end of one [`ChangeBus`] channel.
#[derive(Debug)]
pub struct ChangeSubscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone> ChangeSubscription<E> {
    /// Wraps a receiver of any broadcast channel with the same lag handling.
    pub(crate) fn from_receiver(rx: broadcast::Receiver<E>) -> Self {
        Self { rx }
    }

    /// Waits for the next event. Returns `None` once the bus is gone.
    ///
    /// After falling behind, skips every stale event and returns the newest one.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscriber lagged, skipping to latest");
                    if let Some(event) = self.drain_latest() {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the newest queued event without waiting, discarding older ones.
    pub fn try_recv_latest(&mut self) -> Option<E> {
        self.drain_latest()
    }

    fn drain_latest(&mut self) -> Option<E> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(event) => latest = Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return latest,
            }
        }
    }
}

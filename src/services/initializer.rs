//! One-shot asynchronous initialization gate.
//!
//! A value is produced exactly once by exactly one producer, either as a
//! success or as a terminal failure. Any number of tasks may await it; they are
//! all released when the terminal state is set, in no particular order.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, error};

use crate::types::errors::InitializerError;

/// State of a [`SuspendableInitializer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState<T, E> {
    Pending,
    Completed(T),
    Failed(E),
}

impl<T, E> InitState<T, E> {
    fn is_pending(&self) -> bool {
        matches!(self, InitState::Pending)
    }
}

/// A future/promise pair resolved once and awaited by many.
///
/// `is_initialized` is a lock-free poll; `await_until_initialized` suspends
/// without holding any lock and is cancel-safe (dropping the future only drops
/// that caller's receiver).
#[derive(Debug)]
pub struct SuspendableInitializer<T, E> {
    name: String,
    state: watch::Sender<InitState<T, E>>,
    completed: AtomicBool,
}

impl<T, E> SuspendableInitializer<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(InitState::Pending);
        Self {
            name: name.into(),
            state,
            completed: AtomicBool::new(false),
        }
    }

    /// Resolves with a value. Fails if already resolved.
    pub fn init_with_value(&self, value: T) -> Result<(), InitializerError> {
        self.resolve(InitState::Completed(value))?;
        debug!(name = %self.name, "initializer completed");
        Ok(())
    }

    /// Resolves with a terminal failure. Fails if already resolved.
    pub fn init_with_error(&self, err: E) -> Result<(), InitializerError> {
        self.resolve(InitState::Failed(err))?;
        debug!(name = %self.name, "initializer failed");
        Ok(())
    }

    fn resolve(&self, terminal: InitState<T, E>) -> Result<(), InitializerError> {
        let mut terminal = Some(terminal);
        let resolved = self.state.send_if_modified(|state| {
            if !state.is_pending() {
                return false;
            }
            if let Some(next) = terminal.take() {
                // Set before any waiter wakes.
                if matches!(next, InitState::Completed(_)) {
                    self.completed.store(true, Ordering::Release);
                }
                *state = next;
            }
            true
        });

        if !resolved {
            error!(name = %self.name, "initializer resolved twice");
            return Err(InitializerError::AlreadyResolved(self.name.clone()));
        }
        Ok(())
    }

    /// True only once resolved with a value.
    pub fn is_initialized(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Current state without waiting.
    pub fn state(&self) -> InitState<T, E> {
        self.state.borrow().clone()
    }

    /// Waits until the initializer reaches a terminal state and returns the
    /// value or the producer's failure.
    pub async fn await_until_initialized(&self) -> Result<T, E> {
        let mut rx = self.state.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                InitState::Completed(value) => return Ok(value.clone()),
                InitState::Failed(err) => return Err(err.clone()),
                InitState::Pending => {}
            }
            // The sender lives in `self`, so the channel cannot close while borrowed.
            let _ = rx.changed().await;
        }
    }
}

//! Application visibility tracking.
//!
//! The host application reports foreground/background transitions here; the
//! bookmark store listens for `Background` to flush before the process may be
//! suspended.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Whether the application is currently visible to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppVisibility {
    Foreground,
    Background,
}

/// Broadcasts visibility transitions. Reporting the current state again is not a transition.
#[derive(Debug)]
pub struct VisibilityManager {
    current: Mutex<AppVisibility>,
    tx: broadcast::Sender<AppVisibility>,
}

impl VisibilityManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            current: Mutex::new(AppVisibility::Foreground),
            tx,
        }
    }

    pub fn current(&self) -> AppVisibility {
        *self.current.lock()
    }

    /// Records a new visibility. Returns true if it was a transition.
    pub fn set_visibility(&self, visibility: AppVisibility) -> bool {
        let mut current = self.current.lock();
        if *current == visibility {
            return false;
        }
        *current = visibility;
        debug!(?visibility, "app visibility changed");
        let _ = self.tx.send(visibility);
        true
    }

    pub fn on_entered_foreground(&self) -> bool {
        self.set_visibility(AppVisibility::Foreground)
    }

    pub fn on_entered_background(&self) -> bool {
        self.set_visibility(AppVisibility::Background)
    }

    /// Stream of transitions from now on.
    pub fn listen(&self) -> broadcast::Receiver<AppVisibility> {
        self.tx.subscribe()
    }
}

impl Default for VisibilityManager {
    fn default() -> Self {
        Self::new()
    }
}

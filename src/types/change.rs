use super::bookmark::ThreadKey;

/// A change applied to the bookmark store, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkChange {
    /// The initial load finished.
    Initialized,
    Created(Vec<ThreadKey>),
    Deleted(Vec<ThreadKey>),
    /// `None` means "the order changed or everything may have changed".
    Updated(Option<Vec<ThreadKey>>),
}

impl BookmarkChange {
    /// Keys affected by this change. Empty for `Initialized` and `Updated(None)`.
    pub fn thread_keys(&self) -> &[ThreadKey] {
        match self {
            BookmarkChange::Initialized => &[],
            BookmarkChange::Created(keys) | BookmarkChange::Deleted(keys) => keys,
            BookmarkChange::Updated(keys) => keys.as_deref().unwrap_or(&[]),
        }
    }

    /// Like [`thread_keys`](Self::thread_keys) but distinguishes "unspecified" from "none".
    pub fn thread_keys_or_none(&self) -> Option<&[ThreadKey]> {
        match self {
            BookmarkChange::Initialized => None,
            BookmarkChange::Created(keys) | BookmarkChange::Deleted(keys) => Some(keys),
            BookmarkChange::Updated(keys) => keys.as_deref(),
        }
    }
}

/// How subscribers hear about an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// No event; the change is still persisted.
    None,
    #[default]
    Immediate,
    /// Coalesced on the debounced channel. Racy under rapid repeated updates
    /// of the same key; only `on_post_viewed` uses it.
    Debounced,
}

use thiserror::Error;

use super::bookmark::ThreadKey;

// === StoreError ===

/// Errors returned by [`BookmarkStore`](crate::managers::bookmark_store::BookmarkStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store has not finished loading. Callers must await initialization first.
    #[error("Bookmark store is not initialized yet, await initialization first")]
    NotInitialized,
    /// A bookmark for this thread already exists.
    #[error("Bookmark already exists: {0}")]
    AlreadyExists(ThreadKey),
    /// No bookmark exists for this thread.
    #[error("Bookmark not found: {0}")]
    NotFound(ThreadKey),
    /// Order surgery was rejected.
    #[error(transparent)]
    Order(#[from] OrderError),
    /// The initial load failed; the store holds no bookmarks for this session.
    #[error("Bookmark store failed to initialize: {0}")]
    InitializationFailed(#[from] PersistenceError),
}

// === OrderError ===

/// Errors from order surgery on an [`OrderedKeyedStore`](crate::managers::ordered_store::OrderedKeyedStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The provided index is out of bounds.
    #[error("Index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    /// The key is already present in the store.
    #[error("Key already present: {0}")]
    DuplicateKey(String),
}

// === InvariantViolation ===

/// The record set and the order no longer form a bijection. Always a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Record count and order length differ.
    #[error("Inconsistency detected: records.len ({records}) != order.len ({order})")]
    SizeMismatch { records: usize, order: usize },
    /// A key appears in the order without a record.
    #[error("Order contains {0} but records do not")]
    DanglingKey(String),
    /// A key appears in the order more than once.
    #[error("Order contains {0} more than once")]
    DuplicateKey(String),
}

// === InitializerError ===

/// Misuse of a [`SuspendableInitializer`](crate::services::initializer::SuspendableInitializer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitializerError {
    /// A second resolve was attempted after the initializer reached a terminal state.
    #[error("Initializer '{0}' was already resolved")]
    AlreadyResolved(String),
}

// === PersistenceError ===

/// Errors reported by a [`BookmarkRepository`](crate::services::repository::BookmarkRepository).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Loading the stored bookmarks failed.
    #[error("Failed to load bookmarks: {0}")]
    Load(String),
    /// Writing the bookmarks failed.
    #[error("Failed to persist bookmarks: {0}")]
    Persist(String),
}

// === SettingsError ===

/// Errors related to loading and saving store settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A file system operation failed.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// JSON serialization or deserialization failed.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The settings key does not exist.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The value has the wrong type for the key.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

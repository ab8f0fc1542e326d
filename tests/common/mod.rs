//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use threadwatch::managers::bookmark_store::BookmarkStore;
use threadwatch::services::repository::InMemoryRepository;
use threadwatch::services::visibility::VisibilityManager;
use threadwatch::types::bookmark::{ThreadBookmark, ThreadKey};
use threadwatch::types::settings::StoreSettings;

pub const WINDOW: Duration = Duration::from_millis(1000);

pub fn key(thread_no: u64) -> ThreadKey {
    ThreadKey::new("chan", "g", thread_no)
}

pub fn bookmark(thread_no: u64) -> ThreadBookmark {
    ThreadBookmark::new(key(thread_no), Some(format!("Thread {}", thread_no)), None)
}

pub fn test_settings() -> StoreSettings {
    StoreSettings {
        persist_debounce_ms: WINDOW.as_millis() as u64,
        change_debounce_ms: WINDOW.as_millis() as u64,
        check_invariants: true,
        ..StoreSettings::default()
    }
}

/// A started store that has finished loading from `repository`.
pub async fn ready_store(
    repository: Arc<InMemoryRepository>,
    visibility: &VisibilityManager,
    settings: StoreSettings,
) -> BookmarkStore {
    let store = BookmarkStore::start(repository, visibility, settings);
    store
        .await_until_initialized()
        .await
        .expect("store should initialize");
    store
}

/// Lets spawned tasks run without advancing time.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

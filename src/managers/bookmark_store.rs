//! Bookmark store for watched threads.
//!
//! Composes the ordered keyed store, the initialization gate, the change bus and
//! the persistence debouncer. Every mutation takes the write lock, applies its
//! change, releases the lock and only then posts a change event and marks the
//! persistence debouncer dirty.
//!
//! Three background tasks run per store: the initial load, the app-visibility
//! listener that flushes on `Background`, and the debounced persistence worker.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::managers::ordered_store::OrderedKeyedStore;
use crate::services::change_bus::{ChangeBus, ChangeSubscription};
use crate::services::initializer::SuspendableInitializer;
use crate::services::persistence::{FlushOutcome, FlushTarget, PersistenceDebouncer};
use crate::services::repository::BookmarkRepository;
use crate::services::visibility::{AppVisibility, VisibilityManager};
use crate::types::bookmark::{NewBookmark, ThreadBookmark, ThreadKey};
use crate::types::change::{BookmarkChange, NotifyPolicy};
use crate::types::errors::{InvariantViolation, PersistenceError, StoreError};
use crate::types::settings::StoreSettings;

type Entries = OrderedKeyedStore<ThreadKey, ThreadBookmark>;

/// Lifecycle of the initial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoadState::Loading,
            2 => LoadState::Ready,
            3 => LoadState::Failed,
            _ => LoadState::Uninitialized,
        }
    }
}

/// Writes ordered deep copies of every bookmark to the repository.
struct SnapshotFlusher {
    entries: Arc<Entries>,
    repository: Arc<dyn BookmarkRepository>,
}

#[async_trait]
impl FlushTarget for SnapshotFlusher {
    async fn flush(&self) -> Result<usize, PersistenceError> {
        // The read lock is released before the repository is called.
        let snapshot: Vec<ThreadBookmark> = self
            .entries
            .read_locked(|entries| entries.iter().map(|(_, bm)| bm.clone()).collect());
        let count = snapshot.len();
        self.repository.persist(snapshot).await?;
        Ok(count)
    }
}

struct Inner {
    entries: Arc<Entries>,
    initializer: SuspendableInitializer<(), PersistenceError>,
    load_state: AtomicU8,
    bus: ChangeBus<BookmarkChange>,
    fetch_events: broadcast::Sender<ThreadKey>,
    persistence: PersistenceDebouncer,
    settings: StoreSettings,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn set_load_state(&self, state: LoadState) {
        self.load_state.store(state as u8, Ordering::Release);
    }

    fn is_active(&self, bookmark: &ThreadBookmark) -> bool {
        bookmark.is_active() && !self.settings.is_archive_site(&bookmark.key().site)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Concurrency-safe, ordered store of watched-thread bookmarks.
///
/// Cheap to clone; clones share the same store. Every operation except
/// [`contains`](Self::contains), [`thumbnail_url`](Self::thumbnail_url) and
/// [`on_post_viewed`](Self::on_post_viewed) fails with
/// [`StoreError::NotInitialized`] until the initial load has completed.
///
/// Viewer and mutator closures run while the store's lock is held. The lock is
/// not reentrant: a closure that calls back into the same store deadlocks.
#[derive(Clone)]
pub struct BookmarkStore {
    inner: Arc<Inner>,
}

impl BookmarkStore {
    /// Creates the store and starts its background tasks. Must be called inside
    /// a Tokio runtime.
    pub fn start(
        repository: Arc<dyn BookmarkRepository>,
        visibility: &VisibilityManager,
        settings: StoreSettings,
    ) -> Self {
        let entries = Arc::new(Entries::new(settings.check_invariants));
        let flusher = SnapshotFlusher {
            entries: entries.clone(),
            repository: repository.clone(),
        };
        let persistence = PersistenceDebouncer::new(Arc::new(flusher), settings.persist_debounce());
        let bus = ChangeBus::new(settings.change_buffer, settings.change_debounce());
        let (fetch_events, _) = broadcast::channel(settings.change_buffer.max(1));
        let cancel = CancellationToken::new();

        let inner = Arc::new(Inner {
            entries,
            initializer: SuspendableInitializer::new("BookmarkStore"),
            load_state: AtomicU8::new(LoadState::Uninitialized as u8),
            bus,
            fetch_events,
            persistence,
            settings,
            cancel: cancel.clone(),
            tasks: Mutex::new(Vec::new()),
        });

        let visibility_task = tokio::spawn(flush_on_background(
            Arc::downgrade(&inner),
            visibility.listen(),
            cancel.clone(),
        ));
        let load_task = tokio::spawn(load_bookmarks(inner.clone(), repository, cancel));
        inner.tasks.lock().extend([load_task, visibility_task]);

        Self { inner }
    }

    // --- Initialization ---

    /// Waits for the initial load. Returns the load error if it failed.
    pub async fn await_until_initialized(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            return Ok(());
        }

        debug!("bookmark store is not ready yet, waiting");
        let started = Instant::now();
        self.inner
            .initializer
            .await_until_initialized()
            .await
            .map_err(StoreError::InitializationFailed)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "bookmark store ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.initializer.is_initialized()
    }

    pub fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.inner.load_state.load(Ordering::Acquire))
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            return Ok(());
        }
        warn!(state = ?self.load_state(), "bookmark store used before initialization");
        Err(StoreError::NotInitialized)
    }

    // --- Mutations ---

    /// Bookmarks a thread, placing it at the head of the order.
    pub fn create(
        &self,
        key: ThreadKey,
        title: Option<String>,
        thumbnail_url: Option<String>,
    ) -> Result<(), StoreError> {
        self.ensure_ready()?;

        self.inner.entries.write_locked(|entries| {
            if entries.contains(&key) {
                return Err(StoreError::AlreadyExists(key.clone()));
            }
            let bookmark = ThreadBookmark::new(key.clone(), title, thumbnail_url);
            entries.insert_at_head(key.clone(), bookmark)?;
            Ok(())
        })?;

        debug!(%key, "bookmark created");
        self.changed(BookmarkChange::Created(vec![key]), NotifyPolicy::Immediate);
        Ok(())
    }

    /// Bookmarks many threads at once, skipping ones that already exist. The
    /// created batch lands at the head of the order in the given sequence.
    pub fn create_many(&self, bookmarks: Vec<NewBookmark>) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;

        let created = self.insert_batch(bookmarks)?;
        if !created.is_empty() {
            debug!(count = created.len(), "bookmarks created");
            self.changed(BookmarkChange::Created(created.clone()), NotifyPolicy::Immediate);
        }
        Ok(created)
    }

    /// Like [`create_many`](Self::create_many), but posts no event and writes
    /// to the repository before returning.
    ///
    /// Meant for the filter watcher, which groups the new bookmarks first and
    /// then announces them with [`emit_created`](Self::emit_created).
    pub async fn create_many_silently(
        &self,
        bookmarks: Vec<NewBookmark>,
    ) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;

        let created = self.insert_batch(bookmarks)?;
        if created.is_empty() {
            return Ok(created);
        }

        debug!(count = created.len(), "bookmarks created for filter watcher");
        self.inner.persistence.mark_dirty_and_schedule_flush();
        if self.inner.persistence.flush_now().await == FlushOutcome::Failed {
            warn!(count = created.len(), "filter watcher bookmarks not persisted yet");
        }
        Ok(created)
    }

    /// Announces bookmarks created by [`create_many_silently`](Self::create_many_silently).
    pub fn emit_created(&self, keys: Vec<ThreadKey>) {
        if keys.is_empty() {
            return;
        }
        self.inner.bus.post_immediate(BookmarkChange::Created(keys));
    }

    fn insert_batch(&self, bookmarks: Vec<NewBookmark>) -> Result<Vec<ThreadKey>, StoreError> {
        self.inner.entries.write_locked(|entries| {
            let mut created = Vec::new();
            for new in bookmarks {
                if entries.contains(&new.key) {
                    continue;
                }
                let key = new.key.clone();
                entries.insert_at(created.len(), key.clone(), new.into_bookmark())?;
                created.push(key);
            }
            Ok::<_, StoreError>(created)
        })
    }

    pub fn delete(&self, key: &ThreadKey) -> Result<(), StoreError> {
        self.ensure_ready()?;

        let removed = self
            .inner
            .entries
            .write_locked(|entries| entries.remove(key).is_some());
        if !removed {
            return Err(StoreError::NotFound(key.clone()));
        }

        debug!(%key, "bookmark deleted");
        self.changed(BookmarkChange::Deleted(vec![key.clone()]), NotifyPolicy::Immediate);
        Ok(())
    }

    /// Deletes every listed bookmark that exists. Missing keys are skipped.
    /// Returns the keys actually deleted.
    pub fn delete_many(&self, keys: &[ThreadKey]) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;

        let deleted = self.inner.entries.write_locked(|entries| {
            keys.iter()
                .filter(|key| entries.remove(key).is_some())
                .cloned()
                .collect::<Vec<_>>()
        });

        if !deleted.is_empty() {
            debug!(count = deleted.len(), "bookmarks deleted");
            self.changed(BookmarkChange::Deleted(deleted.clone()), NotifyPolicy::Immediate);
        }
        Ok(deleted)
    }

    /// Deletes every bookmark.
    pub fn delete_all(&self) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;

        let deleted = self.inner.entries.write_locked(|entries| entries.clear());
        if !deleted.is_empty() {
            info!(count = deleted.len(), "all bookmarks deleted");
            self.changed(BookmarkChange::Deleted(deleted.clone()), NotifyPolicy::Immediate);
        }
        Ok(deleted)
    }

    /// Applies `mutator` to a deep copy of each existing bookmark in `keys` and
    /// keeps the copy only if it differs from the original. Missing keys are
    /// skipped. Returns the keys that actually changed.
    ///
    /// Unchanged bookmarks produce no event and do not dirty persistence.
    /// `mutator` runs under the write lock and must not call back into the store.
    pub fn update<F>(
        &self,
        keys: &[ThreadKey],
        policy: NotifyPolicy,
        mut mutator: F,
    ) -> Result<Vec<ThreadKey>, StoreError>
    where
        F: FnMut(&mut ThreadBookmark),
    {
        self.ensure_ready()?;

        let updated = self.inner.entries.write_locked(|entries| {
            let mut updated: Vec<ThreadKey> = Vec::new();
            for key in keys {
                let Some(original) = entries.get(key) else {
                    continue;
                };

                let mut copy = original.clone();
                mutator(&mut copy);
                if copy == *original {
                    continue;
                }

                entries.replace(key, copy);
                if !updated.contains(key) {
                    updated.push(key.clone());
                }
            }
            updated
        });

        if !updated.is_empty() {
            debug!(count = updated.len(), ?policy, "bookmarks updated");
            self.changed(BookmarkChange::Updated(Some(updated.clone())), policy);
        }
        Ok(updated)
    }

    /// Single-key [`update`](Self::update). Returns whether the bookmark changed.
    pub fn update_one<F>(
        &self,
        key: &ThreadKey,
        policy: NotifyPolicy,
        mutator: F,
    ) -> Result<bool, StoreError>
    where
        F: FnMut(&mut ThreadBookmark),
    {
        let updated = self.update(std::slice::from_ref(key), policy, mutator)?;
        Ok(!updated.is_empty())
    }

    /// Moves the bookmark at display position `from` to position `to`.
    pub fn reorder(&self, from: usize, to: usize) -> Result<(), StoreError> {
        self.ensure_ready()?;

        self.inner.entries.move_entry(from, to)?;
        if from == to {
            return Ok(());
        }

        debug!(from, to, "bookmark moved");
        self.changed(BookmarkChange::Updated(None), NotifyPolicy::Immediate);
        Ok(())
    }

    /// Removes every bookmark that is no longer active, in a single write pass.
    pub fn prune_inactive(&self) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;

        let inner = &self.inner;
        let pruned = inner
            .entries
            .write_locked(|entries| entries.retain(|_, bookmark| inner.is_active(bookmark)));

        if !pruned.is_empty() {
            info!(count = pruned.len(), "pruned inactive bookmarks");
            self.changed(BookmarkChange::Deleted(pruned.clone()), NotifyPolicy::Immediate);
        }
        Ok(pruned)
    }

    /// Marks all posts and replies of one thread as read.
    pub fn read_posts_and_notifications(
        &self,
        key: &ThreadKey,
        last_post_no: Option<u64>,
    ) -> Result<bool, StoreError> {
        self.update_one(key, NotifyPolicy::Immediate, |bookmark| {
            bookmark.read_all_posts_and_notifications();
            if let Some(post_no) = last_post_no {
                bookmark.update_last_viewed_post_no(post_no);
            }
        })
    }

    /// Marks all posts and replies of every thread as read.
    pub fn read_all_posts_and_notifications(&self) -> Result<Vec<ThreadKey>, StoreError> {
        let keys = self.ordered_keys()?;
        self.update(&keys, NotifyPolicy::Immediate, |bookmark| {
            bookmark.read_all_posts_and_notifications()
        })
    }

    /// Records that the user scrolled to `post_no`.
    ///
    /// Called very often while scrolling, so it notifies on the debounced
    /// channel only. Silently ignored before initialization, for unknown
    /// threads and for posts that are not newer than the last viewed one.
    pub fn on_post_viewed(&self, key: &ThreadKey, post_no: u64, unseen_posts_count: u32) {
        if !self.is_ready() {
            return;
        }

        let last_viewed = self
            .inner
            .entries
            .read_locked(|entries| entries.get(key).map(|bm| bm.last_viewed_post_no));
        match last_viewed {
            Some(last_viewed) if post_no > last_viewed => {}
            _ => return,
        }

        let result = self.update_one(key, NotifyPolicy::Debounced, |bookmark| {
            bookmark.update_seen_posts_count(unseen_posts_count);
            bookmark.update_last_viewed_post_no(post_no);
            bookmark.read_replies_up_to(post_no);
        });
        if let Err(err) = result {
            warn!(%key, %err, "failed to record viewed post");
        }
    }

    /// Reports that the currently opened thread started fetching new posts.
    ///
    /// Forwarded to [`subscribe_fetch_events`](Self::subscribe_fetch_events)
    /// only when the thread has an active bookmark.
    pub fn on_thread_fetching(&self, key: &ThreadKey) {
        let active = self
            .inner
            .entries
            .read_locked(|entries| entries.get(key).is_some_and(ThreadBookmark::is_active));
        if active {
            let _ = self.inner.fetch_events.send(key.clone());
        }
    }

    fn changed(&self, change: BookmarkChange, policy: NotifyPolicy) {
        match policy {
            NotifyPolicy::None => {}
            NotifyPolicy::Immediate => self.inner.bus.post_immediate(change),
            NotifyPolicy::Debounced => self.inner.bus.post_debounced(change),
        }
        self.inner.persistence.mark_dirty_and_schedule_flush();
    }

    // --- Reads ---

    /// Runs `viewer` on the bookmark for `key`, if present.
    ///
    /// `viewer` runs under the read lock and must not call back into the store.
    pub fn view<T>(
        &self,
        key: &ThreadKey,
        viewer: impl FnOnce(&ThreadBookmark) -> T,
    ) -> Result<Option<T>, StoreError> {
        self.ensure_ready()?;
        Ok(self
            .inner
            .entries
            .read_locked(|entries| entries.get(key).map(viewer)))
    }

    /// Maps every existing bookmark in `keys`, in the order given. Missing keys are skipped.
    pub fn map_many<T>(
        &self,
        keys: &[ThreadKey],
        mut mapper: impl FnMut(&ThreadBookmark) -> T,
    ) -> Result<Vec<T>, StoreError> {
        self.ensure_ready()?;
        Ok(self.inner.entries.read_locked(|entries| {
            keys.iter()
                .filter_map(|key| entries.get(key))
                .map(&mut mapper)
                .collect()
        }))
    }

    /// Maps every bookmark in display order.
    pub fn map_all_ordered<T>(
        &self,
        mut mapper: impl FnMut(&ThreadBookmark) -> T,
    ) -> Result<Vec<T>, StoreError> {
        self.ensure_ready()?;
        Ok(self
            .inner
            .entries
            .read_locked(|entries| entries.iter().map(|(_, bm)| mapper(bm)).collect()))
    }

    /// Visits bookmarks in display order until `visitor` returns false.
    /// Same locking rules as [`view`](Self::view).
    pub fn iterate_ordered_while(
        &self,
        mut visitor: impl FnMut(&ThreadBookmark) -> bool,
    ) -> Result<(), StoreError> {
        self.ensure_ready()?;
        self.inner.entries.read_locked(|entries| {
            for (_, bookmark) in entries.iter() {
                if !visitor(bookmark) {
                    break;
                }
            }
        });
        Ok(())
    }

    pub fn ordered_keys(&self) -> Result<Vec<ThreadKey>, StoreError> {
        self.ensure_ready()?;
        Ok(self.inner.entries.read_locked(|entries| entries.keys().to_vec()))
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.ensure_ready()?;
        Ok(self.inner.entries.len())
    }

    /// Bookmarks still being watched, excluding archive sites.
    pub fn active_count(&self) -> Result<usize, StoreError> {
        self.ensure_ready()?;
        let inner = &self.inner;
        Ok(inner
            .entries
            .read_locked(|entries| entries.values().filter(|bm| inner.is_active(bm)).count()))
    }

    pub fn has_active_bookmarks(&self) -> Result<bool, StoreError> {
        self.ensure_ready()?;
        let inner = &self.inner;
        Ok(inner
            .entries
            .read_locked(|entries| entries.values().any(|bm| inner.is_active(bm))))
    }

    /// Sum of unseen posts over all bookmarks.
    pub fn total_unseen_count(&self) -> Result<u64, StoreError> {
        self.ensure_ready()?;
        Ok(self.inner.entries.read_locked(|entries| {
            entries
                .values()
                .map(|bm| u64::from(bm.unseen_posts_count()))
                .sum()
        }))
    }

    pub fn has_unread_replies(&self) -> Result<bool, StoreError> {
        self.ensure_ready()?;
        Ok(self
            .inner
            .entries
            .read_locked(|entries| entries.values().any(ThreadBookmark::has_unread_replies)))
    }

    /// False before initialization.
    pub fn contains(&self, key: &ThreadKey) -> bool {
        self.inner.entries.read_locked(|entries| entries.contains(key))
    }

    pub fn contains_any(&self, keys: &[ThreadKey]) -> bool {
        self.inner
            .entries
            .read_locked(|entries| keys.iter().any(|key| entries.contains(key)))
    }

    pub fn thumbnail_url(&self, key: &ThreadKey) -> Option<String> {
        self.inner
            .entries
            .read_locked(|entries| entries.get(key).and_then(|bm| bm.thumbnail_url.clone()))
    }

    /// Checks the record/order bijection.
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        self.inner.entries.assert_consistent()
    }

    // --- Change streams & persistence ---

    /// Every change, as it happens.
    pub fn subscribe(&self) -> ChangeSubscription<BookmarkChange> {
        self.inner.bus.subscribe()
    }

    /// Debounced changes: the latest one after the quiescence window.
    pub fn subscribe_debounced(&self) -> ChangeSubscription<BookmarkChange> {
        self.inner.bus.subscribe_debounced()
    }

    /// Active bookmarked threads that started fetching. A slow subscriber skips
    /// to the most recent one.
    pub fn subscribe_fetch_events(&self) -> ChangeSubscription<ThreadKey> {
        ChangeSubscription::from_receiver(self.inner.fetch_events.subscribe())
    }

    /// True if there are mutations not yet written to the repository.
    pub fn is_dirty(&self) -> bool {
        self.inner.persistence.is_dirty()
    }

    /// Writes the current bookmarks right away instead of waiting for the debounce window.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.inner.persistence.flush_now().await
    }

    /// Stops every background task and waits for them, then flushes any
    /// unwritten mutation.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        self.inner.bus.shutdown().await;
        self.inner.persistence.shutdown().await;

        if self.is_ready() && self.is_dirty() {
            self.flush_now().await;
        }
        info!("bookmark store shut down");
    }
}

async fn load_bookmarks(
    inner: Arc<Inner>,
    repository: Arc<dyn BookmarkRepository>,
    cancel: CancellationToken,
) {
    inner.set_load_state(LoadState::Loading);
    let started = Instant::now();

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(PersistenceError::Load(
            "bookmark store shut down before loading finished".to_string(),
        )),
        result = repository.load_all() => result,
    };

    let bookmarks = match result {
        Ok(bookmarks) => bookmarks,
        Err(err) => {
            error!(%err, "failed to initialize bookmark store");
            inner.set_load_state(LoadState::Failed);
            if let Err(err) = inner.initializer.init_with_error(err) {
                error!(%err, "bookmark store initializer misuse");
            }
            return;
        }
    };

    let duplicates = inner.entries.write_locked(|entries| {
        entries.clear();
        let mut duplicates = 0usize;
        for bookmark in bookmarks {
            let key = bookmark.key().clone();
            if entries.push_back(key, bookmark).is_err() {
                duplicates += 1;
            }
        }
        duplicates
    });
    if duplicates > 0 {
        warn!(duplicates, "repository returned duplicate bookmarks, kept the first of each");
    }

    inner.set_load_state(LoadState::Ready);
    if let Err(err) = inner.initializer.init_with_value(()) {
        error!(%err, "bookmark store initializer misuse");
        return;
    }

    let (count, active) = inner.entries.read_locked(|entries| {
        let active = entries.values().filter(|bm| inner.is_active(bm)).count();
        (entries.len(), active)
    });
    info!(
        count,
        active,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "bookmark store initialized"
    );

    inner.bus.post_immediate(BookmarkChange::Initialized);
}

async fn flush_on_background(
    inner: Weak<Inner>,
    mut visibility: broadcast::Receiver<AppVisibility>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = visibility.recv() => event,
        };

        let visibility = match event {
            Ok(visibility) => visibility,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "visibility listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if visibility != AppVisibility::Background {
            continue;
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.initializer.is_initialized() {
            continue;
        }

        debug!("app entered background, flushing bookmarks");
        inner.persistence.flush_now().await;
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Identity of a watched thread: site + board + thread number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadKey {
    pub site: String,
    pub board: String,
    pub thread_no: u64,
}

impl ThreadKey {
    pub fn new(site: impl Into<String>, board: impl Into<String>, thread_no: u64) -> Self {
        Self {
            site: site.into(),
            board: board.into(),
            thread_no,
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.site, self.board, self.thread_no)
    }
}

bitflags! {
    /// Watch-state flags of a bookmark.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BookmarkState: u16 {
        /// The thread is being watched (not paused). Set on every new bookmark.
        const WATCHING = 1 << 0;
        /// The thread 404ed on the server.
        const THREAD_DELETED = 1 << 1;
        /// The thread was moved to a first-party archive.
        const THREAD_ARCHIVED = 1 << 2;
        const THREAD_CLOSED = 1 << 3;
        /// The last fetch failed for any reason.
        const ERROR = 1 << 4;
        const BUMP_LIMIT = 1 << 5;
        const IMAGE_LIMIT = 1 << 6;
        /// Cleared once the very first fetch completes, with any result.
        const FIRST_FETCH = 1 << 7;
        /// Sticky thread without a post cap.
        const STICKY_NO_CAP = 1 << 8;
        /// Bookmarked automatically because the thread matched a watch filter.
        const FILTER_WATCH = 1 << 9;
    }
}

impl Default for BookmarkState {
    fn default() -> Self {
        BookmarkState::WATCHING | BookmarkState::FIRST_FETCH
    }
}

/// A post in a watched thread that quotes one of the user's own posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkReply {
    pub post_no: u64,
    /// The user's post this reply quotes.
    pub replies_to: u64,
    pub already_seen: bool,
    pub already_notified: bool,
    pub already_read: bool,
    pub created_at: i64,
}

impl BookmarkReply {
    pub fn new(post_no: u64, replies_to: u64) -> Self {
        Self {
            post_no,
            replies_to,
            already_seen: false,
            already_notified: false,
            already_read: false,
            created_at: now(),
        }
    }
}

/// Partial state update produced by a thread fetch. `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStateUpdate {
    pub error: Option<bool>,
    pub deleted: Option<bool>,
    pub archived: Option<bool>,
    pub closed: Option<bool>,
    pub sticky_no_cap: Option<bool>,
}

/// A watched thread.
///
/// Equality is structural over every field, which is what lets the store
/// suppress events for updates that change nothing. `Clone` is a deep copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBookmark {
    key: ThreadKey,
    pub seen_posts_count: u32,
    pub total_posts_count: u32,
    pub last_viewed_post_no: u64,
    pub replies: BTreeMap<u64, BookmarkReply>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub state: BookmarkState,
    pub created_at: i64,
}

impl ThreadBookmark {
    /// Creates a fresh bookmark in the `WATCHING | FIRST_FETCH` state.
    pub fn new(key: ThreadKey, title: Option<String>, thumbnail_url: Option<String>) -> Self {
        Self::with_initial_state(key, title, thumbnail_url, BookmarkState::empty())
    }

    /// Like [`new`](Self::new), with extra flags set on top of `WATCHING | FIRST_FETCH`.
    pub fn with_initial_state(
        key: ThreadKey,
        title: Option<String>,
        thumbnail_url: Option<String>,
        initial: BookmarkState,
    ) -> Self {
        Self {
            key,
            seen_posts_count: 0,
            total_posts_count: 0,
            last_viewed_post_no: 0,
            replies: BTreeMap::new(),
            title,
            thumbnail_url,
            state: initial | BookmarkState::default(),
            created_at: now(),
        }
    }

    /// The thread this bookmark watches. Fixed for the lifetime of the record.
    pub fn key(&self) -> &ThreadKey {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.state.contains(BookmarkState::WATCHING)
    }

    pub fn is_archived(&self) -> bool {
        self.state.contains(BookmarkState::THREAD_ARCHIVED)
    }

    pub fn is_closed(&self) -> bool {
        self.state.contains(BookmarkState::THREAD_CLOSED)
    }

    pub fn is_sticky_closed(&self) -> bool {
        self.state
            .contains(BookmarkState::STICKY_NO_CAP | BookmarkState::THREAD_CLOSED)
    }

    pub fn unseen_posts_count(&self) -> u32 {
        self.total_posts_count.saturating_sub(self.seen_posts_count)
    }

    pub fn has_unread_replies(&self) -> bool {
        self.replies.values().any(|reply| !reply.already_read)
    }

    pub fn clear_first_fetch_flag(&mut self) {
        self.state.remove(BookmarkState::FIRST_FETCH);
    }

    pub fn update_last_viewed_post_no(&mut self, post_no: u64) {
        self.last_viewed_post_no = self.last_viewed_post_no.max(post_no);
    }

    /// Derives the seen count from how many posts are still unseen while the
    /// user scrolls. Never moves backwards.
    pub fn update_seen_posts_count(&mut self, unseen_posts_count: u32) {
        let seen = self.total_posts_count.saturating_sub(unseen_posts_count);
        self.seen_posts_count = self.seen_posts_count.max(seen);
    }

    /// Resets the seen count after a fetch brought `new_posts_count` new posts.
    pub fn update_seen_posts_count_after_fetch(&mut self, new_posts_count: u32) {
        self.seen_posts_count = self.total_posts_count.saturating_sub(new_posts_count);
    }

    /// Takes the server's post count as is; it drops when posts get deleted.
    pub fn update_total_posts_count(&mut self, total: u32) {
        self.total_posts_count = total;
    }

    pub fn set_bump_limit(&mut self, bump_limit: bool) {
        self.state.set(BookmarkState::BUMP_LIMIT, bump_limit);
    }

    pub fn set_image_limit(&mut self, image_limit: bool) {
        self.state.set(BookmarkState::IMAGE_LIMIT, image_limit);
    }

    pub fn is_filter_watched(&self) -> bool {
        self.state.contains(BookmarkState::FILTER_WATCH)
    }

    pub fn set_filter_watch_flag(&mut self) {
        self.state.insert(BookmarkState::FILTER_WATCH);
    }

    pub fn remove_filter_watch_flag(&mut self) {
        self.state.remove(BookmarkState::FILTER_WATCH);
    }

    /// Inserts a reply unless one with the same post number is already tracked.
    pub fn add_reply(&mut self, reply: BookmarkReply) {
        self.replies.entry(reply.post_no).or_insert(reply);
    }

    /// Marks every reply up to and including `post_no` as notified, seen and read.
    pub fn read_replies_up_to(&mut self, post_no: u64) {
        for reply in self.replies.range_mut(..=post_no).map(|(_, r)| r) {
            reply.already_notified = true;
            reply.already_seen = true;
            reply.already_read = true;
        }
    }

    pub fn read_all_posts_and_notifications(&mut self) {
        self.seen_posts_count = self.total_posts_count;
        for reply in self.replies.values_mut() {
            reply.already_notified = true;
            reply.already_seen = true;
            reply.already_read = true;
        }
    }

    pub fn mark_all_replies_seen(&mut self) {
        for reply in self.replies.values_mut() {
            reply.already_seen = true;
            reply.already_notified = true;
        }
    }

    /// Pauses or resumes watching. Deleted, archived and sticky-closed threads
    /// cannot be resumed.
    pub fn toggle_watching(&mut self) {
        if self.is_active() {
            self.state.remove(BookmarkState::WATCHING);
            return;
        }

        if self.state.contains(BookmarkState::THREAD_DELETED)
            || self.is_archived()
            || self.is_sticky_closed()
        {
            return;
        }

        self.state.insert(BookmarkState::WATCHING);
    }

    /// Applies the outcome of a thread fetch.
    ///
    /// Once a thread is deleted or sticky-closed its state is frozen; the only
    /// change still applied is that watching stops.
    pub fn update_state(&mut self, update: ThreadStateUpdate) {
        if self.state.contains(BookmarkState::THREAD_DELETED) || self.is_sticky_closed() {
            self.state.remove(BookmarkState::WATCHING);
            return;
        }

        // A sticky closed thread may live for years without updates.
        let sticky_closed = update.sticky_no_cap == Some(true) && update.closed == Some(true);
        if update.deleted == Some(true) || update.archived == Some(true) || sticky_closed {
            self.state.remove(BookmarkState::WATCHING);
        }

        if let Some(error) = update.error {
            self.state.set(BookmarkState::ERROR, error);
        }
        if update.deleted == Some(true) {
            self.state.insert(BookmarkState::THREAD_DELETED);
        }
        if update.archived == Some(true) {
            self.state.insert(BookmarkState::THREAD_ARCHIVED);
        }
        if let Some(closed) = update.closed {
            self.state.set(BookmarkState::THREAD_CLOSED, closed);
        }
        if let Some(sticky) = update.sticky_no_cap {
            self.state.set(BookmarkState::STICKY_NO_CAP, sticky);
        }
    }
}

/// Input for bulk bookmark creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub key: ThreadKey,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Flags set on top of `WATCHING | FIRST_FETCH`.
    pub initial_state: BookmarkState,
}

impl NewBookmark {
    pub fn new(key: ThreadKey) -> Self {
        Self {
            key,
            title: None,
            thumbnail_url: None,
            initial_state: BookmarkState::empty(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_initial_state(mut self, state: BookmarkState) -> Self {
        self.initial_state |= state;
        self
    }

    pub(crate) fn into_bookmark(self) -> ThreadBookmark {
        ThreadBookmark::with_initial_state(self.key, self.title, self.thumbnail_url, self.initial_state)
    }
}

/// Returns the current UNIX timestamp in seconds.
fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

//! ThreadWatch demo.
//!
//! Drives a bookmark store backed by an in-memory repository through its
//! lifecycle: loading, mutations, change notifications, background flush and
//! shutdown.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use threadwatch::managers::bookmark_store::BookmarkStore;
use threadwatch::services::repository::InMemoryRepository;
use threadwatch::services::settings_engine::SettingsEngine;
use threadwatch::services::visibility::VisibilityManager;
use threadwatch::tracing_setup::init_tracing;
use threadwatch::types::bookmark::{
    BookmarkState, NewBookmark, ThreadBookmark, ThreadKey, ThreadStateUpdate,
};
use threadwatch::types::change::NotifyPolicy;
use threadwatch::types::settings::StoreSettings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut engine = SettingsEngine::new(std::env::var("THREADWATCH_SETTINGS").ok());
    let mut settings = match engine.load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Ignoring unreadable settings ({}), using defaults", err);
            StoreSettings::default()
        }
    };
    init_tracing(settings.verbose_logs);

    // Short windows so the demo finishes quickly.
    settings.persist_debounce_ms = 200;
    settings.change_debounce_ms = 200;
    settings.archive_sites = vec!["archive".to_string()];

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              ThreadWatch v{} - Demo Mode                  ║", env!("CARGO_PKG_VERSION"));
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut archived = ThreadBookmark::new(ThreadKey::new("archive", "g", 1), Some("Old thread".into()), None);
    archived.update_state(ThreadStateUpdate {
        archived: Some(true),
        ..Default::default()
    });
    let repository = Arc::new(InMemoryRepository::with_bookmarks(vec![
        ThreadBookmark::new(ThreadKey::new("chan", "g", 100), Some("Desktop thread".into()), None),
        archived,
    ]));
    let visibility = VisibilityManager::new();

    section("Loading");
    let store = BookmarkStore::start(repository.clone(), &visibility, settings);
    store.await_until_initialized().await?;
    println!("  Loaded {} bookmarks ({} active)", store.count()?, store.active_count()?);

    let mut changes = store.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            println!("  ↳ change: {:?}", change);
        }
    });

    section("Mutations");
    let key = ThreadKey::new("chan", "a", 4242);
    store.create(key.clone(), Some("Anime thread".into()), Some("https://i.example/4242s.jpg".into()))?;
    let created = store.create_many(vec![
        NewBookmark::new(ThreadKey::new("chan", "v", 7)).with_title("Video games"),
        NewBookmark::new(key.clone()),
    ])?;
    println!("  Batch created {} new bookmark(s)", created.len());

    store.update_one(&key, NotifyPolicy::Immediate, |bookmark| {
        bookmark.update_total_posts_count(150);
        bookmark.clear_first_fetch_flag();
    })?;
    store.on_post_viewed(&key, 4300, 120);
    store.reorder(0, 2)?;
    println!("  Order: {}", join_keys(&store.ordered_keys()?));
    println!("  Unseen posts: {}", store.total_unseen_count()?);

    section("Persistence");
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  Dirty before background: {}", store.is_dirty());
    visibility.on_entered_background();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  Repository holds {} bookmarks after background flush", repository.stored().len());

    section("Pruning");
    store.update_one(&ThreadKey::new("chan", "g", 100), NotifyPolicy::None, |bookmark| {
        bookmark.state.remove(BookmarkState::WATCHING);
    })?;
    let pruned = store.prune_inactive()?;
    println!("  Pruned: {}", join_keys(&pruned));

    store.shutdown().await;
    printer.abort();

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Persisted {} bookmark(s) in {} write(s): {}",
        repository.stored().len(),
        repository.persist_count(),
        join_keys(&repository.stored().iter().map(|b| b.key().clone()).collect::<Vec<_>>()),
    );
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn join_keys(keys: &[ThreadKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

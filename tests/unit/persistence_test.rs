use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use threadwatch::services::persistence::{FlushOutcome, FlushTarget, PersistenceDebouncer};
use threadwatch::types::errors::PersistenceError;

const WINDOW: Duration = Duration::from_millis(1000);

#[derive(Default)]
struct CountingTarget {
    flushes: AtomicUsize,
    fail: AtomicBool,
}

impl CountingTarget {
    fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlushTarget for CountingTarget {
    async fn flush(&self) -> Result<usize, PersistenceError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Persist("unplugged".to_string()));
        }
        Ok(3)
    }
}

fn debouncer() -> (Arc<CountingTarget>, PersistenceDebouncer) {
    let target = Arc::new(CountingTarget::default());
    let debouncer = PersistenceDebouncer::new(target.clone(), WINDOW);
    (target, debouncer)
}

#[tokio::test(start_paused = true)]
async fn test_many_marks_flush_once() {
    let (target, debouncer) = debouncer();

    for _ in 0..20 {
        debouncer.mark_dirty_and_schedule_flush();
    }
    assert!(debouncer.is_dirty());

    tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
    assert_eq!(target.flushes(), 1);
    assert!(!debouncer.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_window_restarts_on_each_mark() {
    let (target, debouncer) = debouncer();

    debouncer.mark_dirty_and_schedule_flush();
    tokio::time::sleep(Duration::from_millis(600)).await;
    debouncer.mark_dirty_and_schedule_flush();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(target.flushes(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(target.flushes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_flush_now_skips_when_clean() {
    let (target, debouncer) = debouncer();
    assert_eq!(debouncer.flush_now().await, FlushOutcome::Clean);
    assert_eq!(target.flushes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flush_now_preempts_debounced_flush() {
    let (target, debouncer) = debouncer();

    debouncer.mark_dirty_and_schedule_flush();
    assert_eq!(debouncer.flush_now().await, FlushOutcome::Persisted(3));

    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(target.flushes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mark_after_flush_now_is_still_written() {
    let (target, debouncer) = debouncer();

    debouncer.mark_dirty_and_schedule_flush();
    debouncer.flush_now().await;
    debouncer.mark_dirty_and_schedule_flush();

    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(target.flushes(), 2);
    assert!(!debouncer.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_stays_dirty_and_retries() {
    let (target, debouncer) = debouncer();
    target.fail.store(true, Ordering::SeqCst);

    debouncer.mark_dirty_and_schedule_flush();
    assert_eq!(debouncer.flush_now().await, FlushOutcome::Failed);
    assert!(debouncer.is_dirty());

    target.fail.store(false, Ordering::SeqCst);
    assert_eq!(debouncer.flush_now().await, FlushOutcome::Persisted(3));
    assert!(!debouncer.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_flush() {
    let (target, debouncer) = debouncer();

    debouncer.mark_dirty_and_schedule_flush();
    debouncer.shutdown().await;
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(target.flushes(), 0);
    assert!(debouncer.is_dirty());
}

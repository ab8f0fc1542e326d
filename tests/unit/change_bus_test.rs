use std::time::Duration;

use threadwatch::services::change_bus::ChangeBus;

const WINDOW: Duration = Duration::from_millis(1000);

#[tokio::test(start_paused = true)]
async fn test_immediate_events_reach_every_subscriber() {
    let bus = ChangeBus::new(16, WINDOW);
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    bus.post_immediate(1u32);
    bus.post_immediate(2u32);

    assert_eq!(first.recv().await, Some(1));
    assert_eq!(first.recv().await, Some(2));
    assert_eq!(second.recv().await, Some(1));
    assert_eq!(second.recv().await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_sees_only_new_events() {
    let bus = ChangeBus::new(16, WINDOW);
    bus.post_immediate("before");
    let mut late = bus.subscribe();
    bus.post_immediate("after");

    assert_eq!(late.recv().await, Some("after"));
    assert_eq!(late.try_recv_latest(), None);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_delivers_latest_after_quiet_window() {
    let bus = ChangeBus::new(16, WINDOW);
    let mut debounced = bus.subscribe_debounced();

    for n in 1..=5u32 {
        bus.post_debounced(n);
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    // Last post was 300ms ago, window not over yet.
    assert_eq!(debounced.try_recv_latest(), None);

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(debounced.try_recv_latest(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_debounced_does_not_repeat_without_new_events() {
    let bus = ChangeBus::new(16, WINDOW);
    let mut debounced = bus.subscribe_debounced();

    bus.post_debounced(1u32);
    assert_eq!(debounced.recv().await, Some(1));

    tokio::time::sleep(WINDOW * 3).await;
    assert_eq!(debounced.try_recv_latest(), None);
}

#[tokio::test(start_paused = true)]
async fn test_lagging_subscriber_jumps_to_newest() {
    let bus = ChangeBus::new(2, WINDOW);
    let mut slow = bus.subscribe();

    for n in 0..10u32 {
        bus.post_immediate(n);
    }

    assert_eq!(slow.recv().await, Some(9));
}

#[tokio::test(start_paused = true)]
async fn test_recv_ends_when_bus_is_dropped() {
    let bus = ChangeBus::<u32>::new(4, WINDOW);
    let mut sub = bus.subscribe();
    drop(bus);
    assert_eq!(sub.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drops_pending_debounced_event() {
    let bus = ChangeBus::new(4, WINDOW);
    let mut debounced = bus.subscribe_debounced();

    bus.post_debounced(1u32);
    bus.shutdown().await;
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(debounced.try_recv_latest(), None);
}

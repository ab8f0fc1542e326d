use threadwatch::services::visibility::{AppVisibility, VisibilityManager};

#[test]
fn test_starts_in_foreground() {
    let manager = VisibilityManager::new();
    assert_eq!(manager.current(), AppVisibility::Foreground);
}

#[test]
fn test_only_transitions_are_broadcast() {
    let manager = VisibilityManager::default();
    let mut events = manager.listen();

    assert!(!manager.on_entered_foreground());
    assert!(manager.on_entered_background());
    assert!(!manager.on_entered_background());
    assert!(manager.on_entered_foreground());

    assert_eq!(events.try_recv().unwrap(), AppVisibility::Background);
    assert_eq!(events.try_recv().unwrap(), AppVisibility::Foreground);
    assert!(events.try_recv().is_err());
    assert_eq!(manager.current(), AppVisibility::Foreground);
}

#[test]
fn test_transition_without_listeners_is_recorded() {
    let manager = VisibilityManager::new();
    assert!(manager.set_visibility(AppVisibility::Background));
    assert_eq!(manager.current(), AppVisibility::Background);
}

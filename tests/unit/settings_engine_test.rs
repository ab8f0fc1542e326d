//! Integration-level unit tests for the SettingsEngine public API.
//!
//! Covers default loading, value persistence, validation and reset against a
//! settings file in a temp directory.

use std::fs;

use threadwatch::services::settings_engine::SettingsEngine;
use threadwatch::types::errors::SettingsError;
use threadwatch::types::settings::StoreSettings;
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, StoreSettings::default());
}

#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value("persist_debounce_ms", serde_json::json!(250))
            .unwrap();
        engine
            .set_value("archive_sites", serde_json::json!(["archive"]))
            .unwrap();
    }

    let mut engine = engine_in_temp(&dir);
    let loaded = engine.load().unwrap();
    assert_eq!(loaded.persist_debounce_ms, 250);
    assert_eq!(loaded.archive_sites, vec!["archive".to_string()]);
    assert!(loaded.is_archive_site("archive"));
}

#[test]
fn test_set_value_unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value("no_such_field", serde_json::json!(true));
    assert!(matches!(result, Err(SettingsError::InvalidKey(_))));

    let result = engine.set_value("", serde_json::json!(true));
    assert!(matches!(result, Err(SettingsError::InvalidKey(_))));
}

#[test]
fn test_set_value_wrong_type_leaves_settings_untouched() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value("change_buffer", serde_json::json!("lots"));
    match result {
        Err(SettingsError::InvalidValue { key, .. }) => assert_eq!(key, "change_buffer"),
        other => panic!("expected InvalidValue, got {:?}", other),
    }
    assert_eq!(engine.settings().change_buffer, 128);
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn test_reset_restores_defaults_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();
    engine.set_value("verbose_logs", serde_json::json!(true)).unwrap();

    engine.reset().unwrap();
    assert_eq!(*engine.settings(), StoreSettings::default());

    let mut reloaded = engine_in_temp(&dir);
    assert_eq!(reloaded.load().unwrap(), StoreSettings::default());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.json"), r#"{ "change_debounce_ms": 50 }"#).unwrap();

    let mut engine = engine_in_temp(&dir);
    let settings = engine.load().unwrap();

    assert_eq!(settings.change_debounce_ms, 50);
    assert_eq!(settings.persist_debounce_ms, 1000);
    assert_eq!(settings.change_buffer, 128);
}

#[test]
fn test_malformed_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.json"), "{ invalid json }").unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(matches!(engine.load(), Err(SettingsError::SerializationError(_))));
}

#[test]
fn test_save_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("settings.json");
    let mut engine = SettingsEngine::new(Some(path.to_string_lossy().to_string()));
    engine.load().unwrap();

    engine.save().unwrap();
    assert!(path.exists());
}

#[test]
fn test_empty_change_buffer_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value("change_buffer", serde_json::json!(0));
    assert_eq!(
        result,
        Err(SettingsError::InvalidValue {
            key: "change_buffer".to_string(),
            message: "must hold at least one change".to_string(),
        })
    );
    assert_eq!(engine.settings().change_buffer, 128);
}

#[test]
fn test_out_of_range_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.json"), r#"{ "change_buffer": 0 }"#).unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(matches!(
        engine.load(),
        Err(SettingsError::InvalidValue { key, .. }) if key == "change_buffer"
    ));
    assert_eq!(*engine.settings(), StoreSettings::default());
}

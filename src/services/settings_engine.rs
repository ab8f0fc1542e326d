//! JSON-backed store settings.
//!
//! Settings live in `settings.json` under the platform config directory unless
//! a path is given. Fields missing from the file take their defaults, and every
//! value is range-checked before the store sees it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::StoreSettings;

/// Owns the current [`StoreSettings`] and the file they are kept in.
#[derive(Debug)]
pub struct SettingsEngine {
    path: PathBuf,
    settings: StoreSettings,
}

impl SettingsEngine {
    /// Uses `path_override` if given, otherwise the platform default path.
    pub fn new(path_override: Option<String>) -> Self {
        let path = path_override
            .map(PathBuf::from)
            .unwrap_or_else(platform::default_settings_path);

        Self {
            path,
            settings: StoreSettings::default(),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings file. A missing file yields defaults.
    pub fn load(&mut self) -> Result<StoreSettings, SettingsError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            self.settings = StoreSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read {}: {}", self.path.display(), e)))?;
        let settings: StoreSettings = serde_json::from_str(&content)
            .map_err(|e| SettingsError::SerializationError(format!("Failed to parse settings: {}", e)))?;
        validate(&settings)?;

        info!(path = %self.path.display(), "settings loaded");
        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Writes the current settings, creating parent directories as needed.
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SettingsError::IoError(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| SettingsError::SerializationError(e.to_string()))?;
        fs::write(&self.path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write {}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Sets one top-level field (e.g. `"persist_debounce_ms"`) and saves.
    ///
    /// On any error the current settings and the file are left untouched.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut fields = match serde_json::to_value(&self.settings) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => Map::new(),
            Err(e) => return Err(SettingsError::SerializationError(e.to_string())),
        };
        match fields.get_mut(key) {
            Some(slot) => *slot = value,
            None => return Err(SettingsError::InvalidKey(format!("'{}' is not a setting", key))),
        }

        let updated: StoreSettings =
            serde_json::from_value(Value::Object(fields)).map_err(|e| SettingsError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        validate(&updated)?;

        self.settings = updated;
        self.save()?;
        info!(key, "setting updated");
        Ok(())
    }

    /// Restores the defaults and saves them.
    pub fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = StoreSettings::default();
        self.save()
    }
}

fn validate(settings: &StoreSettings) -> Result<(), SettingsError> {
    if settings.change_buffer == 0 {
        return Err(invalid("change_buffer", "must hold at least one change"));
    }
    if settings.archive_sites.iter().any(|site| site.trim().is_empty()) {
        return Err(invalid("archive_sites", "site names cannot be blank"));
    }
    Ok(())
}

fn invalid(key: &str, message: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

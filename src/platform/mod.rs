// ThreadWatch platform abstraction
// Resolves where settings live on Windows, macOS, and Linux.
//
// Uses `cfg(target_os)` for conditional compilation to select the correct
// platform-specific implementation at compile time.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Returns the platform-specific configuration directory for ThreadWatch.
///
/// - **Linux**: `~/.config/threadwatch` (or `$XDG_CONFIG_HOME/threadwatch`)
/// - **macOS**: `~/Library/Application Support/ThreadWatch`
/// - **Windows**: `%APPDATA%/ThreadWatch`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Default location of the settings file.
pub fn default_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

// ThreadWatch platform paths for Linux
// Config: $XDG_CONFIG_HOME/threadwatch, falling back to ~/.config/threadwatch

use std::env;
use std::path::PathBuf;

pub fn get_config_dir() -> PathBuf {
    resolve_config_dir(env::var("XDG_CONFIG_HOME").ok(), env::var("HOME").ok())
}

fn resolve_config_dir(xdg_config_home: Option<String>, home: Option<String>) -> PathBuf {
    match xdg_config_home.filter(|dir| !dir.is_empty()) {
        Some(xdg) => PathBuf::from(xdg).join("threadwatch"),
        None => {
            let home = home.unwrap_or_else(|| String::from("/tmp"));
            PathBuf::from(home).join(".config").join("threadwatch")
        }
    }
}

// ThreadWatch platform paths for macOS
// Config: ~/Library/Application Support/ThreadWatch

use std::env;
use std::path::PathBuf;

pub fn get_config_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
    PathBuf::from(home)
        .join("Library")
        .join("Application Support")
        .join("ThreadWatch")
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the bookmark store, stored as JSON by the settings engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Quiescence window before dirty bookmarks are flushed to the repository.
    pub persist_debounce_ms: u64,
    /// Quiescence window of the debounced change channel.
    pub change_debounce_ms: u64,
    /// Capacity of each change channel before slow subscribers start lagging.
    pub change_buffer: usize,
    /// Verify the record/order bijection after every write section.
    pub check_invariants: bool,
    pub verbose_logs: bool,
    /// Sites that are archives; their bookmarks never count as active.
    pub archive_sites: Vec<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            persist_debounce_ms: 1000,
            change_debounce_ms: 1000,
            change_buffer: 128,
            check_invariants: cfg!(debug_assertions),
            verbose_logs: false,
            archive_sites: Vec::new(),
        }
    }
}

impl StoreSettings {
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }

    pub fn is_archive_site(&self, site: &str) -> bool {
        self.archive_sites.iter().any(|s| s == site)
    }
}

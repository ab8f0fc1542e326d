//! ThreadWatch: a concurrency-safe, ordered store for watched-thread bookmarks
//! with change notifications and debounced persistence.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod managers;
pub mod platform;
pub mod services;
pub mod tracing_setup;
pub mod types;

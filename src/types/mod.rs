// threadwatch shared type definitions
// Each submodule defines types used across the store and its services.

pub mod bookmark;
pub mod change;
pub mod errors;
pub mod settings;

// ThreadWatch state managers
// Managers own shared state: the generic ordered keyed store and the bookmark store built on it.

pub mod bookmark_store;
pub mod ordered_store;

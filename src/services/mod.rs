// ThreadWatch services
// Services provide the building blocks the bookmark store composes: initialization,
// change broadcasting, persistence, app visibility and settings.

pub mod change_bus;
pub mod initializer;
pub mod persistence;
pub mod repository;
pub mod settings_engine;
pub mod visibility;

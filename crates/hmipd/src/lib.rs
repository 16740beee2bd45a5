pub mod api;
pub mod config;
mod engine;
mod integrations;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::CommandError;
pub use engine::Engine;
pub use engine::EntityCommand;
pub use engine::EntityState;
pub use engine::EntityValue;
pub use engine::Event;
pub use engine::Platform;
pub use engine::State;

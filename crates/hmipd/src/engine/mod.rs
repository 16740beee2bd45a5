mod device;
mod engine;
mod error;
mod event;
mod integration;
mod message;
pub mod state;

pub use device::Device;
pub use engine::Engine;
pub use error::CommandError;
pub use event::Event;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::EntityCommand;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::BinarySensorState;
pub use state::EntityState;
pub use state::EntityValue;
pub use state::LightState;
pub use state::LockState;
pub use state::Platform;
pub use state::SensorState;
pub use state::State;
pub use state::SwitchState;
pub use state::WeatherState;

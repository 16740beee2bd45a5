//! Type-safe message system for hmipd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::oneshot;

use super::device::Device;
use super::error::CommandError;
use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
        device: Option<Device>,
    },

    /// An entity was removed (device deleted at the vendor, etc.)
    EntityRemoved { entity_id: String },

    /// An entity's state or availability changed
    EntityStateChanged {
        entity_id: String,
        state: EntityState,
    },
}

/// A command a host caller can issue against an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "command", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCommand {
    TurnOn {
        #[serde(default)]
        brightness: Option<u8>,
        /// Hue and saturation, for colour lights
        #[serde(default)]
        hs_color: Option<(f64, f64)>,
        #[serde(default)]
        effect: Option<String>,
    },
    TurnOff,
    Lock,
    Unlock,
    Open,
    Press,
    SetValue {
        value: f64,
    },
}

impl EntityCommand {
    /// `turn_on` without any light parameters.
    pub fn turn_on() -> Self {
        EntityCommand::TurnOn {
            brightness: None,
            hs_color: None,
            effect: None,
        }
    }
}

/// Reply channel for a command; the integration answers once the vendor call finished.
pub type CommandReply = oneshot::Sender<Result<(), CommandError>>;

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug)]
pub enum ToIntegrationMessage {
    /// Execute a command against an entity owned by the integration
    Command {
        entity_id: String,
        command: EntityCommand,
        reply: CommandReply,
    },
}

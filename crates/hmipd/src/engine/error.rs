/// User-facing error for a command issued against an entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("No integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("Entity {entity_id} does not support '{command}'")]
    Unsupported { entity_id: String, command: String },

    #[error("Error executing '{command}' on {entity_id}: {message}")]
    Failed {
        entity_id: String,
        command: String,
        message: String,
    },

    #[error("Integration for {0} is not running")]
    IntegrationUnavailable(String),
}

use super::state::EntityState;

/// Entity lifecycle events broadcast to engine subscribers.
///
/// Distinct from `FromIntegrationMessage` (transport-level). The engine converts
/// `FromIntegrationMessage` into `Event` at the boundary.
#[derive(Debug, Clone)]
pub enum Event {
    EntityAdded {
        entity_id: String,
    },
    EntityRemoved {
        entity_id: String,
    },
    StateChanged {
        entity_id: String,
        old_state: Option<EntityState>,
        new_state: EntityState,
    },
}

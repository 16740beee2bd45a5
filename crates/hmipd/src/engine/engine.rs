use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::error::CommandError;
use super::event::Event;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::EntityCommand;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::EntityState;
use super::state::State;
use crate::engine::IntegrationContext;

/// hmipd engine
///
/// This structure handles the flow of events, routing commands to the integration
/// that owns an entity, and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Fan-out of automation-level events
    events: broadcast::Sender<Event>,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

/// Capacity for the engine event broadcast; slow subscribers observe `Lagged`
const EVENT_CHANNEL_SIZE: usize = 256;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            events,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Walks the integration registry and registers every integration whose
    /// factory accepts the configuration.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
            info!("Integration '{}' stopped", name);
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Send a command to the integration owning `entity_id` and wait for its outcome.
    ///
    /// Vendor-side failures come back as [`CommandError::Failed`]; the entity's
    /// state is left untouched until the integration reports a real change.
    pub async fn send_command(
        &self,
        entity_id: &str,
        command: EntityCommand,
    ) -> Result<(), CommandError> {
        let tx = self.route(entity_id)?;

        let (reply, reply_rx) = oneshot::channel();
        let msg = ToIntegrationMessage::Command {
            entity_id: entity_id.to_string(),
            command,
            reply,
        };
        tx.send(msg)
            .map_err(|_| CommandError::IntegrationUnavailable(entity_id.to_string()))?;

        reply_rx
            .await
            .map_err(|_| CommandError::IntegrationUnavailable(entity_id.to_string()))?
    }

    /// Look up the channel of the integration that owns this entity
    fn route(&self, entity_id: &str) -> Result<ToIntegrationSender, CommandError> {
        let map = self
            .entity_integration_map
            .lock()
            .map_err(|_| CommandError::IntegrationUnavailable(entity_id.to_string()))?;

        let integration_name = map
            .get(entity_id)
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))?;

        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| CommandError::IntegrationUnavailable(entity_id.to_string()))?;

        channels
            .get(integration_name)
            .cloned()
            .ok_or_else(|| CommandError::IntegrationUnavailable(entity_id.to_string()))
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Stop all integrations.
    ///
    /// Dropping the command channels ends each integration's command loop, which
    /// then runs the integration's own shutdown.
    pub async fn shutdown(&self) {
        info!("Stopping integrations");
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles = match self.integration_handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Current state of a single entity
    pub fn entity_state(&self, entity_id: &str) -> Option<EntityState> {
        self.state.load().entities.get(entity_id).cloned()
    }

    /// Subscribe to state-change events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
                device,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                // Record which integration owns this entity for command routing.
                // State is not populated until the first state-change message arrives.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id.clone(), integration_name);
                }

                if let Some(device) = device {
                    let mut state = State::clone(&self.state.load());
                    state
                        .devices
                        .entry(device.id.clone())
                        .or_insert(device)
                        .add_entity(entity_id.clone());
                    self.state.store(Arc::new(state));
                }

                self.emit(Event::EntityAdded { entity_id });
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                {
                    let mut state = State::clone(&self.state.load());
                    state.entities.remove(&entity_id);
                    for device in state.devices.values_mut() {
                        device.remove_entity(&entity_id);
                    }
                    state.devices.retain(|_, device| !device.entity_ids.is_empty());
                    self.state.store(Arc::new(state));
                }

                // Remove from routing map
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.remove(&entity_id);
                }

                self.emit(Event::EntityRemoved { entity_id });
            }
            FromIntegrationMessage::EntityStateChanged { entity_id, state } => {
                let old_state = {
                    let mut snapshot = State::clone(&self.state.load());
                    let old = snapshot.entities.insert(entity_id.clone(), state.clone());
                    self.state.store(Arc::new(snapshot));
                    old
                };

                if old_state.as_ref() == Some(&state) {
                    debug!("State unchanged: {}", entity_id);
                    return;
                }

                info!(
                    "State changed: {} -> available={}, {:?}",
                    entity_id, state.available, state.value
                );

                self.emit(Event::StateChanged {
                    entity_id,
                    old_state,
                    new_state: state,
                });
            }
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine; events are best-effort.
        let _ = self.events.send(event);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::Device;
    use crate::engine::state::EntityValue;
    use crate::engine::state::SwitchState;

    /// Integration that announces one switch and answers every command with a fixed result
    struct FixedReplyIntegration {
        reply: Result<(), CommandError>,
        received: Arc<std::sync::Mutex<Vec<EntityCommand>>>,
    }

    #[async_trait]
    impl Integration for FixedReplyIntegration {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            let mut device = Device::new("dev-1".to_string(), "Plug".to_string());
            device.manufacturer = Some("eQ-3".to_string());
            tx.send(FromIntegrationMessage::EntityDiscovered {
                entity_id: "switch.plug".to_string(),
                integration_name: "fixed".to_string(),
                device: Some(device),
            })
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
            tx.send(FromIntegrationMessage::EntityStateChanged {
                entity_id: "switch.plug".to_string(),
                state: switch_state(false),
            })
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            match msg {
                ToIntegrationMessage::Command { command, reply, .. } => {
                    self.received.lock().unwrap().push(command);
                    let _ = reply.send(self.reply.clone());
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    fn switch_state(on: bool) -> EntityState {
        EntityState {
            name: "Plug".to_string(),
            available: true,
            value: EntityValue::Switch(SwitchState { on }),
            attributes: serde_json::Map::new(),
        }
    }

    async fn start(reply: Result<(), CommandError>) -> (Arc<Engine>, Arc<std::sync::Mutex<Vec<EntityCommand>>>) {
        let engine = Arc::new(Engine::new());
        let mut events = engine.subscribe();
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        engine.register_integration(
            "fixed".to_string(),
            Box::new(FixedReplyIntegration {
                reply,
                received: received.clone(),
            }),
        );

        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(Event::StateChanged { .. }) = events.recv().await {
                    break;
                }
            }
        })
        .await
        .expect("switch never reported state");

        (engine, received)
    }

    #[tokio::test]
    async fn test_discovery_populates_state_and_devices() {
        let (engine, _) = start(Ok(())).await;

        let state = engine.state_snapshot();
        assert_eq!(state.entities["switch.plug"], switch_state(false));
        assert_eq!(state.devices["dev-1"].entity_ids, vec!["switch.plug"]);
        assert_eq!(
            state.devices["dev-1"].manufacturer.as_deref(),
            Some("eQ-3")
        );
    }

    #[tokio::test]
    async fn test_command_routed_to_owner() {
        let (engine, received) = start(Ok(())).await;

        engine
            .send_command("switch.plug", EntityCommand::turn_on())
            .await
            .unwrap();

        assert_eq!(
            *received.lock().unwrap(),
            vec![EntityCommand::turn_on()]
        );
    }

    #[tokio::test]
    async fn test_command_error_surfaces_and_state_unchanged() {
        let failure = CommandError::Failed {
            entity_id: "switch.plug".to_string(),
            command: "turn_on".to_string(),
            message: "rejected".to_string(),
        };
        let (engine, _) = start(Err(failure.clone())).await;

        let result = engine
            .send_command("switch.plug", EntityCommand::turn_on())
            .await;

        assert_eq!(result, Err(failure));
        assert_eq!(engine.entity_state("switch.plug"), Some(switch_state(false)));
    }

    #[tokio::test]
    async fn test_command_for_unknown_entity() {
        let engine = Engine::new();
        let result = engine.send_command("light.nowhere", EntityCommand::TurnOff).await;
        assert_eq!(
            result,
            Err(CommandError::UnknownEntity("light.nowhere".to_string()))
        );
    }

    #[tokio::test]
    async fn test_entity_removed_drops_state_and_empty_device() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::EntityDiscovered {
            entity_id: "switch.plug".to_string(),
            integration_name: "fixed".to_string(),
            device: Some(Device::new("dev-1".to_string(), "Plug".to_string())),
        });
        engine.handle_event(FromIntegrationMessage::EntityStateChanged {
            entity_id: "switch.plug".to_string(),
            state: switch_state(true),
        });
        assert!(engine.entity_state("switch.plug").is_some());

        engine.handle_event(FromIntegrationMessage::EntityRemoved {
            entity_id: "switch.plug".to_string(),
        });

        let state = engine.state_snapshot();
        assert!(state.entities.is_empty());
        assert!(state.devices.is_empty());
        assert_eq!(
            engine.send_command("switch.plug", EntityCommand::TurnOff).await,
            Err(CommandError::UnknownEntity("switch.plug".to_string()))
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_integrations() {
        let (engine, _) = start(Ok(())).await;
        engine.shutdown().await;

        assert_eq!(
            engine.send_command("switch.plug", EntityCommand::TurnOff).await,
            Err(CommandError::IntegrationUnavailable(
                "switch.plug".to_string()
            ))
        );
    }
}

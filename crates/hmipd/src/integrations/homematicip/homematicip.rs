use std::error::Error;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use arc_swap::ArcSwap;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::HomematicipConfig;
use super::access_point::AccessPoint;
use super::access_point::ModelObserver;
use super::access_point::ModelView;
use super::access_point::SupervisorOptions;
use super::access_point::UpdateScope;
use super::client::Runner;
use super::entity::EntityContext;
use super::model::ItemId;
use super::model::Model;
use super::platforms::EntitySet;
use crate::engine::CommandError;
use crate::engine::EntityCommand;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

const INTEGRATION_NAME: &str = "homematicip";

/// HomematicIP cloud integration for hmipd
///
/// Runs one access point supervisor and exposes its devices and groups as
/// host entities.
pub struct HomematicipIntegration<R: Runner> {
    /// Handed to the supervisor on setup
    runner: Arc<R>,
    config: HomematicipConfig,
    access_point: Option<AccessPoint<R>>,
    bridge: Option<Arc<EntityBridge>>,
}

impl<R: Runner> HomematicipIntegration<R> {
    pub fn new(runner: R, config: &HomematicipConfig) -> Self {
        Self {
            runner: Arc::new(runner),
            config: config.clone(),
            access_point: None,
            bridge: None,
        }
    }

    async fn execute(&self, entity_id: &str, command: &EntityCommand) -> Result<(), CommandError> {
        let (Some(bridge), Some(access_point)) = (&self.bridge, &self.access_point) else {
            return Err(CommandError::IntegrationUnavailable(entity_id.to_string()));
        };
        let action = {
            let model = access_point.model();
            let entities = bridge.entities.load();
            let entity = entities
                .get(entity_id)
                .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))?;
            entity
                .action(&model, command)
                .ok_or_else(|| CommandError::Unsupported {
                    entity_id: entity_id.to_string(),
                    command: command.as_ref().to_string(),
                })?
        };

        debug!("Executing {:?} for {}", action, entity_id);
        access_point
            .runner()
            .execute(&action)
            .await
            .map_err(|e| {
                if e.is_connection() {
                    debug!("HomematicIP cloud unreachable for {}", entity_id);
                }
                CommandError::Failed {
                    entity_id: entity_id.to_string(),
                    command: command.as_ref().to_string(),
                    message: e.to_string(),
                }
            })
    }
}

#[async_trait]
impl<R: Runner> Integration for HomematicipIntegration<R> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!(
            "Starting HomematicIP integration for HAP {}",
            self.config.accesspoint_id
        );

        let bridge = EntityBridge::new(
            tx,
            self.config.home_name().map(str::to_string),
            Duration::from_secs(self.config.reload_delay_secs),
        );
        let access_point = AccessPoint::start(
            self.runner.clone(),
            bridge.clone(),
            SupervisorOptions {
                accesspoint_id: self.config.accesspoint_id.clone(),
                max_backoff_exponent: self.config.max_backoff_exponent,
            },
        );

        self.bridge = Some(bridge);
        self.access_point = Some(access_point);
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::Command {
                entity_id,
                command,
                reply,
            } => {
                info!("Handling {} command for {}", command.as_ref(), entity_id);
                let result = self.execute(&entity_id, &command).await;
                if let Err(e) = &result {
                    warn!("{}", e);
                }
                if reply.send(result).is_err() {
                    debug!("Caller for {} went away before the reply", entity_id);
                }
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("HomematicIP integration shutting down");
        if let Some(access_point) = self.access_point.take() {
            debug!("Stopping HomematicIP supervisor ({})", access_point.state());
            access_point.shutdown().await;
        }
        if let Some(bridge) = self.bridge.take() {
            bridge.close();
        }
        Ok(())
    }
}

/// Observer turning model fan-outs into engine messages.
struct EntityBridge {
    me: Weak<EntityBridge>,
    to_engine: FromIntegrationSender,
    home_name: Option<String>,
    reload_delay: Duration,
    entities: ArcSwap<EntitySet>,
    /// Serializes entity set rebuilds
    rebuild: Mutex<()>,
    /// Latest model seen, for deferred reloads
    latest: ArcSwapOption<Model>,
    connected: AtomicBool,
    pending_reload: Mutex<Option<JoinHandle<()>>>,
}

impl EntityBridge {
    fn new(
        to_engine: FromIntegrationSender,
        home_name: Option<String>,
        reload_delay: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            to_engine,
            home_name,
            reload_delay,
            entities: ArcSwap::default(),
            rebuild: Mutex::new(()),
            latest: ArcSwapOption::empty(),
            connected: AtomicBool::new(false),
            pending_reload: Mutex::new(None),
        })
    }

    fn send(&self, msg: FromIntegrationMessage) {
        match self.to_engine.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => warn!("Engine queue full, dropping {:?}", msg),
            Err(TrySendError::Closed(_)) => debug!("Engine gone, dropping HomematicIP update"),
        }
    }

    fn context<'a>(&'a self, model: &'a Model, connected: bool) -> EntityContext<'a> {
        EntityContext {
            model,
            connected,
            home_name: self.home_name.as_deref(),
        }
    }

    fn remember(&self, view: &ModelView<'_>) {
        self.latest.store(Some(Arc::clone(view.model)));
        self.connected.store(view.connected, Ordering::SeqCst);
    }

    /// Rebuild the entity set and report what appeared, vanished or changed.
    fn reconfigure(&self, model: &Model, connected: bool) {
        let Ok(_guard) = self.rebuild.lock() else {
            warn!("HomematicIP entity rebuild lock poisoned");
            return;
        };
        let ctx = self.context(model, connected);
        let previous = self.entities.load_full();
        let next = EntitySet::build(&ctx, Some(&previous));

        for (entity_id, _) in previous.iter() {
            if !next.contains(entity_id) {
                info!("Removing HomematicIP entity {}", entity_id);
                self.send(FromIntegrationMessage::EntityRemoved {
                    entity_id: entity_id.clone(),
                });
            }
        }

        for (entity_id, entity) in next.iter() {
            if !previous.contains(entity_id) {
                debug!("Discovered HomematicIP entity {}", entity_id);
                self.send(FromIntegrationMessage::EntityDiscovered {
                    entity_id: entity_id.clone(),
                    integration_name: INTEGRATION_NAME.to_string(),
                    device: entity.device_info(model),
                });
            }
            self.send(FromIntegrationMessage::EntityStateChanged {
                entity_id: entity_id.clone(),
                state: entity.snapshot(&ctx),
            });
        }

        if previous.is_empty() {
            info!("HomematicIP provides {} entities", next.len());
        } else if previous.len() != next.len() {
            info!("HomematicIP now provides {} entities", next.len());
        }
        self.entities.store(Arc::new(next));
    }

    fn refresh(&self, view: &ModelView<'_>, id: &ItemId) {
        let ctx = self.context(view.model, view.connected);
        let entities = self.entities.load();
        for (entity_id, entity) in entities.for_item(id) {
            self.send(FromIntegrationMessage::EntityStateChanged {
                entity_id: entity_id.clone(),
                state: entity.snapshot(&ctx),
            });
        }
    }

    /// Devices get time to be renamed by the user before entities are
    /// re-created; groups are reloaded right away.
    fn schedule_reload(&self, view: &ModelView<'_>, id: &ItemId) {
        if !matches!(id, ItemId::Device(_)) || self.reload_delay.is_zero() {
            self.reconfigure(view.model, view.connected);
            return;
        }

        let Some(me) = self.me.upgrade() else {
            return;
        };
        let delay = self.reload_delay;
        debug!("Reloading HomematicIP entities in {:?} after {} changed", delay, id);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(model) = me.latest.load_full() {
                me.reconfigure(&model, me.connected.load(Ordering::SeqCst));
            }
        });

        if let Ok(mut pending) = self.pending_reload.lock() {
            if let Some(previous) = pending.replace(task) {
                previous.abort();
            }
        }
    }

    /// Cancel any pending reload and forget all entities.
    fn close(&self) {
        if let Ok(mut pending) = self.pending_reload.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
        self.entities.store(Arc::default());
        self.latest.store(None);
    }
}

impl ModelObserver for EntityBridge {
    fn model_updated(&self, view: &ModelView<'_>, scope: &UpdateScope) {
        self.remember(view);
        match scope {
            UpdateScope::All => self.reconfigure(view.model, view.connected),
            UpdateScope::Item(id) => self.refresh(view, id),
        }
    }

    fn item_added(&self, view: &ModelView<'_>, id: &ItemId) {
        self.remember(view);
        self.schedule_reload(view, id);
    }

    fn item_removed(&self, view: &ModelView<'_>, id: &ItemId) {
        self.remember(view);
        // Entities of the removed item read as unavailable until the reload
        self.refresh(view, id);
        self.schedule_reload(view, id);
    }
}

//! Connection supervisor for one HomematicIP access point.
//!
//! A single task owns the runner session: it fetches the full model, opens
//! the update stream, and retries with exponential backoff when either
//! fails. Link loss marks every device unreachable and the next healthy
//! update triggers a full resync before incremental updates resume.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::client::Runner;
use super::client::RunnerEvent;
use super::error::HmipError;
use super::model::ItemId;
use super::model::Model;

/// Buffer between the update listener and the supervisor
const UPDATE_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// What observers see on every fan-out.
pub struct ModelView<'a> {
    pub model: &'a Arc<Model>,
    /// Whether the supervisor holds a live session
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateScope {
    All,
    Item(ItemId),
}

/// Receives model changes on the supervisor task.
///
/// Callbacks must not block; they run synchronously between events.
pub trait ModelObserver: Send + Sync + 'static {
    fn model_updated(&self, view: &ModelView<'_>, scope: &UpdateScope);

    /// An update arrived for an item the model did not know yet.
    fn item_added(&self, _view: &ModelView<'_>, _id: &ItemId) {}

    fn item_removed(&self, _view: &ModelView<'_>, _id: &ItemId) {}
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Identifies the access point in logs
    pub accesspoint_id: String,
    pub max_backoff_exponent: u32,
}

/// Delay before the retry following `tries` consecutive failures.
pub fn backoff_delay(tries: u32, max_exponent: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(tries.min(max_exponent)))
}

struct Shared<R> {
    runner: Arc<R>,
    model: ArcSwap<Model>,
    state: watch::Sender<ConnectionState>,
}

/// Handle to a running supervisor.
pub struct AccessPoint<R: Runner> {
    shared: Arc<Shared<R>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Runner> AccessPoint<R> {
    /// Spawn the supervisor task; the first connection attempt starts immediately.
    pub fn start(
        runner: Arc<R>,
        observer: Arc<dyn ModelObserver>,
        options: SupervisorOptions,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            runner,
            model: ArcSwap::new(Arc::default()),
            state,
        });
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            shared: shared.clone(),
            observer,
            cancel: cancel.clone(),
            options,
            listener: None,
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Latest model snapshot.
    /// Latest published model.
    pub fn model(&self) -> Arc<Model> {
        self.shared.model.load_full()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    #[cfg(test)]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.shared.runner
    }

    /// Stop the supervisor: cancels the retry timer and the update stream.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("HomematicIP supervisor ended abnormally: {}", e);
            }
        }
        self.shared.state.send_replace(ConnectionState::Disconnected);
    }
}

impl<R: Runner> Drop for AccessPoint<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why the listen phase ended
enum ListenExit {
    Cancelled,
    LinkLost,
}

struct Supervisor<R> {
    shared: Arc<Shared<R>>,
    observer: Arc<dyn ModelObserver>,
    cancel: CancellationToken,
    options: SupervisorOptions,
    listener: Option<JoinHandle<Result<(), HmipError>>>,
}

impl<R: Runner> Supervisor<R> {
    async fn run(mut self) {
        let mut tries: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            match self.connect().await {
                Ok(Some(mut events)) => {
                    tries = 0;
                    self.set_state(ConnectionState::Connected);
                    info!(
                        "Connected to HomematicIP with HAP {}",
                        self.options.accesspoint_id
                    );
                    self.fan_out(&UpdateScope::All);

                    if let ListenExit::Cancelled = self.listen(&mut events).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.set_state(ConnectionState::Reconnecting);
                    error!(
                        "Error connecting to HomematicIP with HAP {}. Retrying in {} seconds: {}",
                        self.options.accesspoint_id,
                        backoff_delay(tries, self.options.max_backoff_exponent).as_secs(),
                        e
                    );
                }
            }

            let delay = backoff_delay(tries, self.options.max_backoff_exponent);
            tries = tries.saturating_add(1);
            debug!("Next HomematicIP connection attempt in {:?}", delay);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.stop_listener();
        self.shared
            .state
            .send_replace(ConnectionState::Disconnected);
        info!(
            "Closed connection to HomematicIP cloud server for HAP {}",
            self.options.accesspoint_id
        );
    }

    /// Fetch the model and open the update stream. `None` when cancelled.
    ///
    /// The fetched model is only published once the stream is open, so a
    /// stream that fails to open counts as a failed attempt.
    async fn connect(&mut self) -> Result<Option<mpsc::Receiver<RunnerEvent>>, HmipError> {
        let Some(model) = self.fetch().await? else {
            return Ok(None);
        };

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_SIZE);
        let (ready_tx, ready_rx) = oneshot::channel();
        let runner = self.shared.runner.clone();
        self.stop_listener();
        let listener = tokio::spawn(async move { runner.listen_for_updates(tx, ready_tx).await });

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                listener.abort();
                return Ok(None);
            }
            opened = ready_rx => opened.is_ok(),
        };
        if !opened {
            return Err(match listener.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => HmipError::Connection("update stream closed before opening".into()),
                Err(e) => HmipError::Connection(format!("update listener failed: {e}")),
            });
        }

        self.listener = Some(listener);
        self.shared.model.store(Arc::new(model));
        Ok(Some(rx))
    }

    async fn fetch(&self) -> Result<Option<Model>, HmipError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            result = self.shared.runner.get_current_state() => result.map(Some),
        }
    }

    async fn listen(&mut self, events: &mut mpsc::Receiver<RunnerEvent>) -> ListenExit {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ListenExit::Cancelled,
                event = events.recv() => event,
            };

            match event {
                None => {
                    match self.listener.take() {
                        Some(handle) => match handle.await {
                            Ok(Err(e)) => warn!("HomematicIP update stream failed: {}", e),
                            Ok(Ok(())) => warn!("HomematicIP update stream ended"),
                            Err(e) => warn!("HomematicIP update listener panicked: {}", e),
                        },
                        None => warn!("HomematicIP update stream ended"),
                    }
                    self.set_state(ConnectionState::Reconnecting);
                    self.set_all_unavailable();
                    return ListenExit::LinkLost;
                }
                Some(RunnerEvent::ItemUpdated(item)) => {
                    let id = item.id();
                    let added = self.update_model(|m| m.apply(item));

                    let link_up = self.shared.runner.is_connected()
                        && self.shared.model.load().home.connected;

                    if !link_up {
                        if self.current_state() != ConnectionState::Reconnecting {
                            error!("HMIP access point has lost connection with the cloud");
                            self.set_state(ConnectionState::Reconnecting);
                        }
                        self.set_all_unavailable();
                        continue;
                    }

                    if self.current_state() == ConnectionState::Reconnecting {
                        match self.resync().await {
                            Ok(true) => continue,
                            Ok(false) => return ListenExit::Cancelled,
                            Err(e) => {
                                error!(
                                    "Updating state after HMIP access point reconnect failed: {}",
                                    e
                                );
                                self.stop_listener();
                                self.set_state(ConnectionState::Reconnecting);
                                return ListenExit::LinkLost;
                            }
                        }
                    }

                    self.fan_out(&UpdateScope::Item(id.clone()));
                    if added {
                        let model = self.shared.model.load();
                        let view = self.view(&model);
                        self.observer.item_added(&view, &id);
                    }
                }
                Some(RunnerEvent::ItemRemoved(id)) => {
                    if self.update_model(|m| m.remove(&id)) {
                        debug!("HomematicIP {} removed", id);
                        let model = self.shared.model.load();
                        let view = self.view(&model);
                        self.observer.item_removed(&view, &id);
                    }
                }
            }
        }
    }

    /// Re-fetch the whole model after the link came back. `Ok(false)` when cancelled.
    async fn resync(&mut self) -> Result<bool, HmipError> {
        info!("HMIP access point reconnected, refreshing state");
        self.set_state(ConnectionState::Connecting);

        let Some(model) = self.fetch().await? else {
            return Ok(false);
        };
        self.shared.model.store(Arc::new(model));
        self.set_state(ConnectionState::Connected);
        self.fan_out(&UpdateScope::All);
        Ok(true)
    }

    fn update_model<T>(&self, f: impl FnOnce(&mut Model) -> T) -> T {
        let mut model = Model::clone(&self.shared.model.load());
        let out = f(&mut model);
        self.shared.model.store(Arc::new(model));
        out
    }

    fn set_all_unavailable(&self) {
        self.update_model(Model::mark_all_unreachable);
        self.fan_out(&UpdateScope::All);
    }

    fn view<'a>(&self, model: &'a Arc<Model>) -> ModelView<'a> {
        ModelView {
            model,
            connected: self.current_state() == ConnectionState::Connected,
        }
    }

    fn fan_out(&self, scope: &UpdateScope) {
        let model = self.shared.model.load();
        let view = self.view(&model);
        self.observer.model_updated(&view, scope);
    }

    fn current_state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let old = self.shared.state.send_replace(state);
        if old != state {
            debug!("HomematicIP connection state {} -> {}", old, state);
        }
    }

    fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

//! Vendor boundary: the `Runner` trait and its HomematicIP cloud implementation.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::ClientRequestBuilder;
use tracing::debug;
use tracing::info;
use tracing::trace;
use url::Url;

use super::HomematicipConfig;
use super::error::HmipError;
use super::model::ItemId;
use super::model::Model;
use super::model::ModelItem;

/// API version sent with every request
const API_VERSION: &str = "12";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Events produced by the update stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    ItemUpdated(ModelItem),
    ItemRemoved(ItemId),
}

/// Target of a lock command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockTarget {
    Locked,
    Unlocked,
    Open,
}

/// Colours a notification light can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RgbColor {
    Black,
    Blue,
    Green,
    Turquoise,
    Red,
    Purple,
    Yellow,
    White,
}

/// A vendor REST command.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetSwitchState {
        device_id: String,
        channel_index: u32,
        on: bool,
    },
    SetDimLevel {
        device_id: String,
        channel_index: u32,
        dim_level: f64,
    },
    SetLockState {
        device_id: String,
        channel_index: u32,
        target: LockTarget,
    },
    StartImpulse {
        device_id: String,
        channel_index: u32,
    },
    SetGroupSwitchState {
        group_id: String,
        on: bool,
    },
    SetRgbDimLevelWithTime {
        device_id: String,
        channel_index: u32,
        color: RgbColor,
        dim_level: f64,
        on_time: f64,
        ramp_time: f64,
    },
    SetOpticalSignal {
        device_id: String,
        channel_index: u32,
        behaviour: String,
        color: RgbColor,
        dim_level: f64,
    },
}

impl Action {
    /// Path below `hmip/`
    pub fn path(&self) -> &'static str {
        match self {
            Action::SetSwitchState { .. } => "device/control/setSwitchState",
            Action::SetDimLevel { .. } => "device/control/setDimLevel",
            Action::SetLockState { .. } => "device/control/setLockState",
            Action::StartImpulse { .. } => "device/control/startImpulse",
            Action::SetGroupSwitchState { .. } => "group/switching/setState",
            Action::SetRgbDimLevelWithTime { .. } => {
                "device/control/setSimpleRGBColorDimLevelWithTime"
            }
            Action::SetOpticalSignal { .. } => "device/control/setOpticalSignal",
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Action::SetSwitchState {
                device_id,
                channel_index,
                on,
            } => json!({ "channelIndex": channel_index, "deviceId": device_id, "on": on }),
            Action::SetDimLevel {
                device_id,
                channel_index,
                dim_level,
            } => json!({
                "channelIndex": channel_index,
                "deviceId": device_id,
                "dimLevel": dim_level,
            }),
            Action::SetLockState {
                device_id,
                channel_index,
                target,
            } => json!({
                "channelIndex": channel_index,
                "deviceId": device_id,
                "authorizationPin": "",
                "targetLockState": target.as_ref(),
            }),
            Action::StartImpulse {
                device_id,
                channel_index,
            } => json!({ "channelIndex": channel_index, "deviceId": device_id }),
            Action::SetGroupSwitchState { group_id, on } => {
                json!({ "groupId": group_id, "on": on })
            }
            Action::SetRgbDimLevelWithTime {
                device_id,
                channel_index,
                color,
                dim_level,
                on_time,
                ramp_time,
            } => json!({
                "channelIndex": channel_index,
                "deviceId": device_id,
                "simpleRGBColorState": color.as_ref(),
                "dimLevel": dim_level,
                "onTime": on_time,
                "rampTime": ramp_time,
            }),
            Action::SetOpticalSignal {
                device_id,
                channel_index,
                behaviour,
                color,
                dim_level,
            } => json!({
                "channelIndex": channel_index,
                "deviceId": device_id,
                "opticalSignalBehaviour": behaviour,
                "simpleRGBColorState": color.as_ref(),
                "dimLevel": dim_level,
            }),
        }
    }
}

/// Narrow interface to the vendor cloud.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Fetch the full home model.
    async fn get_current_state(&self) -> Result<Model, HmipError>;

    /// Stream updates into `events` until the link ends.
    ///
    /// `ready` fires once the stream is open; dropping it unsent means the
    /// stream never opened. Returns `Ok` when the receiver went away, and an
    /// error when the link dropped or could not be opened.
    async fn listen_for_updates(
        &self,
        events: mpsc::Sender<RunnerEvent>,
        ready: oneshot::Sender<()>,
    ) -> Result<(), HmipError>;

    /// Whether the update stream is currently connected.
    fn is_connected(&self) -> bool;

    /// Run a command against the cloud.
    async fn execute(&self, action: &Action) -> Result<(), HmipError>;
}

/// `Runner` talking to the HomematicIP cloud over REST and websocket.
pub struct CloudRunner {
    http: reqwest::Client,
    rest_url: Url,
    websocket_url: Url,
    accesspoint_id: String,
    auth_token: String,
    client_auth: String,
    connected: AtomicBool,
}

impl CloudRunner {
    pub fn new(config: &HomematicipConfig) -> Result<Self, HmipError> {
        let rest_url = Url::parse(&config.rest_url)
            .map_err(|e| HmipError::InvalidUrl(format!("{}: {}", config.rest_url, e)))?;
        let websocket_url = Url::parse(&config.websocket_url)
            .map_err(|e| HmipError::InvalidUrl(format!("{}: {}", config.websocket_url, e)))?;

        let mut headers = HeaderMap::new();
        // Header names must be lowercase here; HTTP matches them case-insensitively
        for (name, value) in [
            ("authtoken", config.auth_token.as_str()),
            ("clientauth", config.client_auth.as_str()),
            ("accesspoint-id", config.accesspoint_id.as_str()),
            ("version", API_VERSION),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| HmipError::Connection(format!("invalid {name} header: {e}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            rest_url,
            websocket_url,
            accesspoint_id: config.accesspoint_id.clone(),
            auth_token: config.auth_token.clone(),
            client_auth: config.client_auth.clone(),
            connected: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, HmipError> {
        self.rest_url
            .join(&format!("hmip/{path}"))
            .map_err(|e| HmipError::InvalidUrl(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String, HmipError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(HmipError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Runner for CloudRunner {
    async fn get_current_state(&self) -> Result<Model, HmipError> {
        let body = json!({
            "clientCharacteristics": {
                "apiVersion": API_VERSION,
                "applicationIdentifier": "hmipd",
                "applicationVersion": env!("CARGO_PKG_VERSION"),
                "deviceManufacturer": "none",
                "deviceType": "Computer",
                "language": "en_US",
                "osType": std::env::consts::OS,
                "osVersion": "",
            },
            "id": self.accesspoint_id,
        });
        let text = self.post("home/getCurrentState", &body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn listen_for_updates(
        &self,
        events: mpsc::Sender<RunnerEvent>,
        ready: oneshot::Sender<()>,
    ) -> Result<(), HmipError> {
        info!("Connecting to HomematicIP websocket at {}", self.websocket_url);

        let uri: tungstenite::http::Uri = self
            .websocket_url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| HmipError::InvalidUrl(e.to_string()))?;
        let request = ClientRequestBuilder::new(uri)
            .with_header("AUTHTOKEN", self.auth_token.as_str())
            .with_header("CLIENTAUTH", self.client_auth.as_str())
            .with_header("ACCESSPOINT-ID", self.accesspoint_id.as_str())
            .with_header("VERSION", API_VERSION);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        // Cleared however this future ends, including when the task is aborted
        let _connected = ConnectedFlag::set(&self.connected);
        info!("HomematicIP websocket connected");
        if ready.send(()).is_err() {
            return Ok(());
        }

        let (_write, mut read) = ws_stream.split();
        loop {
            let payload = match read.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(tungstenite::Message::Binary(data))) => data.to_vec(),
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    info!("HomematicIP websocket closed by server: {:?}", frame);
                    return Err(HmipError::Connection("websocket closed".into()));
                }
                Some(Ok(_)) => {
                    trace!("Ignoring websocket control frame");
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(HmipError::Connection("websocket stream ended".into())),
            };

            let parsed = match parse_push_message(&payload) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping undecodable push message: {}", e);
                    continue;
                }
            };
            for event in parsed {
                if events.send(event).await.is_err() {
                    // Supervisor stopped listening
                    return Ok(());
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn execute(&self, action: &Action) -> Result<(), HmipError> {
        self.post(action.path(), &action.body()).await.map(|_| ())
    }
}

/// Holds the websocket flag up while alive.
struct ConnectedFlag<'a>(&'a AtomicBool);

impl<'a> ConnectedFlag<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ConnectedFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct PushMessage {
    /// Keyed by sequence number within the frame
    #[serde(default)]
    events: std::collections::BTreeMap<u32, Value>,
}

/// Decode a websocket push frame into runner events.
///
/// Event types the platforms do not care about are dropped, and so is an
/// event whose item does not decode; the rest of the frame still applies.
pub fn parse_push_message(payload: &[u8]) -> Result<Vec<RunnerEvent>, HmipError> {
    let message: PushMessage = serde_json::from_slice(payload)?;

    let mut parsed = Vec::new();
    for event in message.events.into_values() {
        let kind = event
            .get("pushEventType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let item = match kind {
            "DEVICE_CHANGED" | "DEVICE_ADDED" => match decode(kind, event.get("device")) {
                Some(device) => RunnerEvent::ItemUpdated(ModelItem::Device(device)),
                None => continue,
            },
            "GROUP_CHANGED" | "GROUP_ADDED" => match decode(kind, event.get("group")) {
                Some(group) => RunnerEvent::ItemUpdated(ModelItem::Group(group)),
                None => continue,
            },
            "HOME_CHANGED" => match decode(kind, event.get("home")) {
                Some(home) => RunnerEvent::ItemUpdated(ModelItem::Home(home)),
                None => continue,
            },
            "DEVICE_REMOVED" | "GROUP_REMOVED" => {
                let Some(id) = event.get("id").and_then(Value::as_str) else {
                    continue;
                };
                if kind == "DEVICE_REMOVED" {
                    RunnerEvent::ItemRemoved(ItemId::Device(id.to_string()))
                } else {
                    RunnerEvent::ItemRemoved(ItemId::Group(id.to_string()))
                }
            }
            other => {
                trace!("Ignoring push event {}", other);
                continue;
            }
        };
        parsed.push(item);
    }
    Ok(parsed)
}

fn decode<'a, T: Deserialize<'a>>(kind: &str, item: Option<&'a Value>) -> Option<T> {
    match T::deserialize(item?) {
        Ok(item) => Some(item),
        Err(e) => {
            debug!("Skipping malformed {} push event: {}", kind, e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) use mock::MockRunner;

#[cfg(test)]
mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::sync::mpsc;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    use super::Action;
    use super::HmipError;
    use super::Model;
    use super::Runner;
    use super::RunnerEvent;

    #[derive(Default)]
    struct MockState {
        model: Model,
        fetch_failures: usize,
        fetches: Vec<Instant>,
        stream_failures: usize,
        stream_attempts: Vec<Instant>,
        stream: Option<mpsc::Sender<RunnerEvent>>,
        reject_actions: Option<String>,
        executed: Vec<Action>,
    }

    /// Mock runner for testing
    ///
    /// Serves a scripted model, fails a configurable number of fetches and lets
    /// tests push events or drop the link.
    #[derive(Default)]
    pub struct MockRunner {
        state: Mutex<MockState>,
        connected: AtomicBool,
        link_drop: Notify,
    }

    impl MockRunner {
        pub fn new(model: Model) -> Self {
            let runner = Self::default();
            runner.state.lock().unwrap().model = model;
            runner
        }

        /// Make the next `n` state fetches fail with a connection error.
        pub fn fail_fetches(&self, n: usize) {
            self.state.lock().unwrap().fetch_failures = n;
        }

        /// Instants at which the model was fetched.
        pub fn fetches(&self) -> Vec<Instant> {
            self.state.lock().unwrap().fetches.clone()
        }

        /// Make the next `n` update streams fail before they open.
        pub fn fail_streams(&self, n: usize) {
            self.state.lock().unwrap().stream_failures = n;
        }

        /// Instants at which an update stream was requested.
        pub fn stream_attempts(&self) -> Vec<Instant> {
            self.state.lock().unwrap().stream_attempts.clone()
        }

        pub fn update_model(&self, f: impl FnOnce(&mut Model)) {
            f(&mut self.state.lock().unwrap().model);
        }

        pub fn reject_actions(&self, message: &str) {
            self.state.lock().unwrap().reject_actions = Some(message.to_string());
        }

        pub fn executed(&self) -> Vec<Action> {
            self.state.lock().unwrap().executed.clone()
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn is_listening(&self) -> bool {
            self.state.lock().unwrap().stream.is_some()
        }

        /// End the current update stream with a connection error.
        pub fn drop_link(&self) {
            self.link_drop.notify_one();
        }

        /// Deliver an event once a listener is attached.
        pub async fn push(&self, event: RunnerEvent) {
            let tx = loop {
                if let Some(tx) = self.state.lock().unwrap().stream.clone() {
                    break tx;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            };
            tx.send(event).await.unwrap();
        }
    }

    struct Detach<'a> {
        runner: &'a MockRunner,
        stream: mpsc::Sender<RunnerEvent>,
    }

    impl Drop for Detach<'_> {
        fn drop(&mut self) {
            let mut state = self.runner.state.lock().unwrap();
            if state
                .stream
                .as_ref()
                .is_some_and(|s| s.same_channel(&self.stream))
            {
                state.stream = None;
                self.runner.connected.store(false, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl Runner for MockRunner {
        async fn get_current_state(&self) -> Result<Model, HmipError> {
            let mut state = self.state.lock().unwrap();
            state.fetches.push(Instant::now());
            if state.fetch_failures > 0 {
                state.fetch_failures -= 1;
                return Err(HmipError::Connection("mock fetch failure".into()));
            }
            Ok(state.model.clone())
        }

        async fn listen_for_updates(
            &self,
            events: mpsc::Sender<RunnerEvent>,
            ready: oneshot::Sender<()>,
        ) -> Result<(), HmipError> {
            {
                let mut state = self.state.lock().unwrap();
                state.stream_attempts.push(Instant::now());
                if state.stream_failures > 0 {
                    state.stream_failures -= 1;
                    return Err(HmipError::Connection("mock stream refused".into()));
                }
                state.stream = Some(events.clone());
            }
            self.connected.store(true, Ordering::SeqCst);
            // Also detaches when the listener task is aborted
            let _detach = Detach {
                runner: self,
                stream: events.clone(),
            };
            let _ = ready.send(());

            tokio::select! {
                _ = self.link_drop.notified() => Err(HmipError::Connection("mock link dropped".into())),
                _ = events.closed() => Ok(()),
            }
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn execute(&self, action: &Action) -> Result<(), HmipError> {
            let mut state = self.state.lock().unwrap();
            if let Some(message) = &state.reject_actions {
                return Err(HmipError::Rejected {
                    status: 400,
                    message: message.clone(),
                });
            }
            state.executed.push(action.clone());
            Ok(())
        }
    }
}

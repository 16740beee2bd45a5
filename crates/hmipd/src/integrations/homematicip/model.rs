//! Vendor data model as returned by `getCurrentState` and the push stream.
//!
//! Only the keys the platforms rely on are typed; everything else is kept in
//! per-item attribute maps so a missing key reads as "feature absent".

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub home: Home,
    #[serde(default)]
    pub devices: BTreeMap<String, Device>,
    #[serde(default)]
    pub groups: BTreeMap<String, Group>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    #[serde(default)]
    pub id: String,
    /// Whether the access point is connected to the cloud
    #[serde(default = "default_true")]
    pub connected: bool,
    #[serde(default)]
    pub weather: Option<HomeWeather>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Default for Home {
    fn default() -> Self {
        Self {
            id: String::new(),
            connected: true,
            weather: None,
            location: None,
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeWeather {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub weather_condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub oem: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub home_id: Option<String>,
    #[serde(default, deserialize_with = "channels_by_index")]
    pub functional_channels: BTreeMap<u32, FunctionalChannel>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// The vendor keys channels by stringified index; integer keys do not survive
/// `#[serde(flatten)]` buffering, so re-key by each channel's own index.
fn channels_by_index<'de, D>(deserializer: D) -> Result<BTreeMap<u32, FunctionalChannel>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, FunctionalChannel>::deserialize(deserializer)?;
    Ok(raw.into_values().map(|c| (c.index, c)).collect())
}

impl Device {
    /// Channel 0 carries reachability when the device has channels at all.
    pub fn is_reachable(&self) -> bool {
        match self.functional_channels.get(&0) {
            Some(base) => !base.unreach.unwrap_or(false),
            None => !truthy(self.attributes.get("unreach")),
        }
    }

    pub fn channel(&self, index: u32) -> Option<&FunctionalChannel> {
        self.functional_channels.get(&index)
    }

    pub fn mark_unreachable(&mut self) {
        if let Some(base) = self.functional_channels.get_mut(&0) {
            base.unreach = Some(true);
        }
        self.attributes.insert("unreach".to_string(), Value::Bool(true));
    }

    /// Typed keys are looked up by their vendor name too, so attribute tables can stay flat.
    pub fn attr(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.clone())),
            "modelType" => self.model_type.clone().map(Value::String),
            _ => self.attributes.get(key).cloned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalChannel {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub functional_channel_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unreach: Option<bool>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl FunctionalChannel {
    /// Raw value of a vendor key; `Some(Null)` when the key is present without a value.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(Value::as_bool)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(Value::as_f64)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub group_type: String,
    #[serde(default)]
    pub unreach: Option<bool>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Group {
    pub fn attr(&self, key: &str) -> Option<Value> {
        match key {
            "unreach" => self.unreach.map(Value::Bool),
            _ => self.attributes.get(key).cloned(),
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(Value::as_bool)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Python-style truthiness used by the attribute tables: only non-empty values are copied.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Identity of an item in the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemId {
    Home,
    Device(String),
    Group(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Home => write!(f, "home"),
            ItemId::Device(id) => write!(f, "device {id}"),
            ItemId::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// New data for one item, carried by an update event.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelItem {
    Home(Home),
    Device(Device),
    Group(Group),
}

impl ModelItem {
    pub fn id(&self) -> ItemId {
        match self {
            ModelItem::Home(_) => ItemId::Home,
            ModelItem::Device(d) => ItemId::Device(d.id.clone()),
            ModelItem::Group(g) => ItemId::Group(g.id.clone()),
        }
    }
}

impl Model {
    /// Replace or insert an item. Returns `true` when the item was not known before.
    pub fn apply(&mut self, item: ModelItem) -> bool {
        match item {
            ModelItem::Home(home) => {
                self.home = home;
                false
            }
            ModelItem::Device(device) => self.devices.insert(device.id.clone(), device).is_none(),
            ModelItem::Group(group) => self.groups.insert(group.id.clone(), group).is_none(),
        }
    }

    /// Returns `true` when something was removed.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        match id {
            ItemId::Home => false,
            ItemId::Device(id) => self.devices.remove(id).is_some(),
            ItemId::Group(id) => self.groups.remove(id).is_some(),
        }
    }

    pub fn mark_all_unreachable(&mut self) {
        for device in self.devices.values_mut() {
            device.mark_unreachable();
        }
    }
}

//! Rules shared by every HomematicIP entity: naming, ids, availability,
//! attributes and device registry info.

use serde_json::Map;
use serde_json::Value;

use super::client::Action;
use super::model::Device;
use super::model::FunctionalChannel;
use super::model::Group;
use super::model::ItemId;
use super::model::Model;
use super::model::truthy;
use crate::engine;
use crate::engine::EntityCommand;
use crate::engine::EntityState;
use crate::engine::EntityValue;
use crate::engine::Platform;

/// Identifier namespace used for the device registry
pub const DOMAIN: &str = "homematicip_cloud";

const DEVICE_ATTRIBUTES: &[(&str, &str)] = &[
    ("modelType", "model_type"),
    ("connectionType", "connection_type"),
    ("deviceOverheated", "device_overheated"),
    ("deviceOverloaded", "device_overloaded"),
    ("deviceUndervoltage", "device_undervoltage"),
    ("id", "id"),
];

const BASE_CHANNEL_ATTRIBUTES: &[(&str, &str)] = &[
    ("configPending", "config_pending"),
    ("dutyCycle", "duty_cycle_reached"),
    ("rssiDeviceValue", "rssi_device"),
    ("rssiPeerValue", "rssi_peer"),
    ("sabotage", "sabotage"),
];

const GROUP_ATTRIBUTES: &[(&str, &str)] = &[
    ("modelType", "model_type"),
    ("lowBat", "low_battery"),
    ("sabotage", "sabotage"),
    ("dutyCycle", "duty_cycle_reached"),
    ("configPending", "config_pending"),
    ("unreach", "group_member_unreachable"),
];

pub type Attributes = Map<String, Value>;

/// Everything an entity needs to render its state.
#[derive(Clone, Copy)]
pub struct EntityContext<'a> {
    pub model: &'a Model,
    /// Whether the update stream is up
    pub connected: bool,
    /// Configured home name, prefixed to entity names
    pub home_name: Option<&'a str>,
}

/// Where an entity takes its data from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Channel { device_id: String, index: u32 },
    Group { group_id: String },
    Home,
}

impl Source {
    pub fn item_id(&self) -> ItemId {
        match self {
            Source::Channel { device_id, .. } => ItemId::Device(device_id.clone()),
            Source::Group { group_id } => ItemId::Group(group_id.clone()),
            Source::Home => ItemId::Home,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenericEntity {
    /// Entity class name; prefix of the unique id
    pub kind: String,
    pub source: Source,
    pub post: Option<String>,
    pub multi_channel: bool,
    /// Model type reported for groups and the home, which carry none themselves
    pub model_type: Option<String>,
}

impl GenericEntity {
    pub fn for_channel(kind: &str, device: &Device, channel: &FunctionalChannel) -> Self {
        Self {
            kind: kind.to_string(),
            source: Source::Channel {
                device_id: device.id.clone(),
                index: channel.index,
            },
            post: None,
            multi_channel: false,
            model_type: None,
        }
    }

    pub fn for_group(kind: &str, group: &Group, post: &str) -> Self {
        Self {
            kind: kind.to_string(),
            source: Source::Group {
                group_id: group.id.clone(),
            },
            post: Some(post.to_string()),
            multi_channel: false,
            model_type: Some(format!("HmIP-{post}")),
        }
    }

    pub fn for_home(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            source: Source::Home,
            post: None,
            multi_channel: false,
            model_type: None,
        }
    }

    pub fn multi_channel(mut self, multi_channel: bool) -> Self {
        self.multi_channel = multi_channel;
        self
    }

    pub fn post(mut self, post: Option<&str>) -> Self {
        self.post = post.map(str::to_string);
        self
    }

    pub fn device<'m>(&self, model: &'m Model) -> Option<&'m Device> {
        match &self.source {
            Source::Channel { device_id, .. } => model.devices.get(device_id),
            _ => None,
        }
    }

    pub fn channel<'m>(&self, model: &'m Model) -> Option<&'m FunctionalChannel> {
        match &self.source {
            Source::Channel { index, .. } => self.device(model)?.channel(*index),
            _ => None,
        }
    }

    pub fn group<'m>(&self, model: &'m Model) -> Option<&'m Group> {
        match &self.source {
            Source::Group { group_id } => model.groups.get(group_id),
            _ => None,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match &self.source {
            Source::Channel { device_id, .. } => Some(device_id),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match &self.source {
            Source::Group { group_id } => Some(group_id),
            _ => None,
        }
    }

    pub fn channel_index(&self) -> Option<u32> {
        match &self.source {
            Source::Channel { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Channel label when it names this entity, else the item label with a suffix.
    pub fn name(&self, ctx: &EntityContext<'_>) -> String {
        let mut name = None;
        if let Some(device) = self.device(ctx.model) {
            if self.multi_channel {
                name = self.channel(ctx.model).and_then(|c| c.label.clone());
            } else if device.functional_channels.len() > 1 {
                name = device.channel(1).and_then(|c| c.label.clone());
            }
        }

        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => {
                let label = self.label(ctx.model);
                match (&self.post, self.channel_index()) {
                    (Some(post), _) => format!("{label} {post}"),
                    (None, Some(index)) if self.multi_channel => format!("{label} Channel{index}"),
                    _ => label,
                }
            }
        };

        with_home_prefix(ctx, name)
    }

    fn label(&self, model: &Model) -> String {
        match &self.source {
            Source::Channel { .. } => self.device(model).map(|d| d.label.clone()),
            Source::Group { .. } => self.group(model).map(|g| g.label.clone()),
            Source::Home => None,
        }
        .unwrap_or_default()
    }

    pub fn unique_id(&self) -> String {
        match &self.source {
            Source::Channel { device_id, index } => {
                format!("{}_Channel{}_{}", self.kind, index, device_id)
            }
            Source::Group { group_id } => format!("{}_{}", self.kind, group_id),
            Source::Home => self.kind.clone(),
        }
    }

    /// Device reachability, or the group's own flag. Vanished items are unavailable.
    pub fn available(&self, ctx: &EntityContext<'_>) -> bool {
        match &self.source {
            Source::Channel { .. } => self.device(ctx.model).is_some_and(Device::is_reachable),
            Source::Group { .. } => self
                .group(ctx.model)
                .is_some_and(|g| !g.unreach.unwrap_or(false)),
            Source::Home => true,
        }
    }

    pub fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = Attributes::new();

        if let Some(device) = self.device(ctx.model) {
            for (key, attr) in DEVICE_ATTRIBUTES {
                copy_truthy(&mut attrs, attr, device.attr(key));
            }
            if let Some(base) = device.channel(0) {
                for (key, attr) in BASE_CHANNEL_ATTRIBUTES {
                    copy_truthy(&mut attrs, attr, base.attr(key).cloned());
                }
            }
            attrs.insert("is_group".to_string(), Value::Bool(false));
        }

        if let Some(group) = self.group(ctx.model) {
            for (key, attr) in GROUP_ATTRIBUTES {
                let value = match *key {
                    "modelType" => self.model_type.clone().map(Value::String),
                    _ => group.attr(key),
                };
                copy_truthy(&mut attrs, attr, value);
            }
            attrs.insert("is_group".to_string(), Value::Bool(true));
        }

        attrs
    }

    /// Only physical devices are registered, linked to the access point.
    pub fn device_info(&self, model: &Model) -> Option<engine::Device> {
        let device = self.device(model)?;
        let mut info = engine::Device::new(device.id.clone(), device.label.clone());
        info.identifiers = vec![(DOMAIN.to_string(), device.id.clone())];
        info.manufacturer = device.oem.clone();
        info.model = device.model_type.clone();
        info.sw_version = device.firmware_version.clone();
        info.via_device = device
            .home_id
            .clone()
            .map(|home_id| (DOMAIN.to_string(), home_id));
        Some(info)
    }
}

pub fn with_home_prefix(ctx: &EntityContext<'_>, name: String) -> String {
    match ctx.home_name {
        Some(home) if !name.is_empty() => format!("{home} {name}"),
        _ => name,
    }
}

pub fn copy_truthy(attrs: &mut Attributes, attr: &str, value: Option<Value>) {
    if truthy(value.as_ref()) {
        if let Some(value) = value {
            attrs.insert(attr.to_string(), value);
        }
    }
}

/// A host entity backed by the HomematicIP model.
pub trait HmipEntity: Send + Sync {
    fn base(&self) -> &GenericEntity;

    fn platform(&self) -> Platform;

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue;

    fn name(&self, ctx: &EntityContext<'_>) -> String {
        self.base().name(ctx)
    }

    fn available(&self, ctx: &EntityContext<'_>) -> bool {
        self.base().available(ctx)
    }

    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        self.base().attributes(ctx)
    }

    fn unique_id(&self) -> String {
        self.base().unique_id()
    }

    fn device_info(&self, model: &Model) -> Option<engine::Device> {
        self.base().device_info(model)
    }

    /// Vendor action for a host command; `None` when the entity does not support it.
    ///
    /// `model` is the latest snapshot, for actions that carry current channel values.
    fn action(&self, _model: &Model, _command: &EntityCommand) -> Option<Action> {
        None
    }

    fn snapshot(&self, ctx: &EntityContext<'_>) -> EntityState {
        EntityState {
            name: self.name(ctx),
            available: self.available(ctx),
            value: self.value(ctx),
            attributes: self.attributes(ctx),
        }
    }
}

/// Channels of the given vendor types, in device then index order.
pub fn channels_of_type<'m>(
    model: &'m Model,
    types: &'m [&'m str],
) -> impl Iterator<Item = (&'m Device, &'m FunctionalChannel)> + 'm {
    model.devices.values().flat_map(move |device| {
        device
            .functional_channels
            .values()
            .filter(move |c| types.contains(&c.functional_channel_type.as_str()))
            .map(move |c| (device, c))
    })
}

/// Lowercase ASCII slug used in entity ids.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'ä' | 'á' | 'à' | 'â' => "a",
            'ö' | 'ó' | 'ò' | 'ô' => "o",
            'ü' | 'ú' | 'ù' | 'û' => "u",
            'é' | 'è' | 'ê' | 'ë' => "e",
            'ß' => "ss",
            c if c.is_ascii_alphanumeric() => {
                slug.push(c);
                continue;
            }
            _ => "_",
        };
        if mapped == "_" && (slug.is_empty() || slug.ends_with('_')) {
            continue;
        }
        slug.push_str(mapped);
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}

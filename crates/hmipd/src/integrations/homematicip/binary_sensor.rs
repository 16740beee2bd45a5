use serde_json::Value;

use super::entity::Attributes;
use super::entity::DOMAIN;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::copy_truthy;
use super::entity::with_home_prefix;
use super::model::Group;
use super::model::Model;
use crate::engine;
use crate::engine::BinarySensorState;
use crate::engine::EntityValue;
use crate::engine::Platform;

/// A binary value read from one key of a functional channel.
struct SensorDescription {
    key: &'static str,
    vendor_key: &'static str,
    /// Appended to the device label
    name: Option<&'static str>,
    device_class: Option<&'static str>,
    is_on: fn(&Value) -> Option<bool>,
    extra_attributes: &'static [(&'static str, &'static str)],
}

const ACCELERATION_ATTRIBUTES: &[(&str, &str)] = &[
    (
        "accelerationSensorEventFilterPeriod",
        "acceleration_sensor_event_filter_period",
    ),
    ("accelerationSensorMode", "acceleration_sensor_mode"),
    (
        "accelerationSensorNeutralPosition",
        "acceleration_sensor_neutral_position",
    ),
    ("accelerationSensorSensitivity", "acceleration_sensor_sensitivity"),
    ("accelerationSensorTriggerAngle", "acceleration_sensor_trigger_angle"),
];

const GROUP_SENSOR_ATTRIBUTES: &[(&str, &str)] = &[
    ("moistureDetected", "moisture_detected"),
    ("motionDetected", "motion_detected"),
    ("powerMainsFailure", "power_mains_failure"),
    ("presenceDetected", "presence_detected"),
    ("waterlevelDetected", "water_level_detected"),
];

fn flag(value: &Value) -> Option<bool> {
    value.as_bool()
}

fn mains_present(value: &Value) -> Option<bool> {
    value.as_bool().map(|failure| !failure)
}

fn smoke_alarm(value: &Value) -> Option<bool> {
    value.as_str().map(|alarm| alarm == "PRIMARY_ALARM")
}

fn window_open(value: &Value) -> Option<bool> {
    value.as_str().map(|state| state != "CLOSED")
}

const fn sensor(
    key: &'static str,
    vendor_key: &'static str,
    name: Option<&'static str>,
    device_class: Option<&'static str>,
) -> SensorDescription {
    SensorDescription {
        key,
        vendor_key,
        name,
        device_class,
        is_on: flag,
        extra_attributes: &[],
    }
}

const CHANNEL_SENSORS: &[SensorDescription] = &[
    SensorDescription {
        extra_attributes: ACCELERATION_ATTRIBUTES,
        ..sensor(
            "acceleration",
            "accelerationSensorTriggered",
            Some("Acceleration"),
            Some("moving"),
        )
    },
    sensor("motion", "motionDetected", Some("Motion"), Some("motion")),
    sensor("presence", "presenceDetected", Some("Presence"), Some("presence")),
    SensorDescription {
        is_on: smoke_alarm,
        ..sensor("smoke", "smokeDetectorAlarmType", Some("Smoke"), Some("smoke"))
    },
    sensor("moisture", "moistureDetected", Some("Moisture"), Some("moisture")),
    sensor("water", "waterlevelDetected", Some("Water"), Some("moisture")),
    sensor("storm", "storm", Some("Storm"), None),
    sensor("raining", "raining", Some("Raining"), Some("moisture")),
    sensor("sunshine", "sunshine", Some("Sunshine"), Some("light")),
    sensor("battery", "lowBat", Some("Battery"), Some("battery")),
    SensorDescription {
        is_on: mains_present,
        ..sensor("power", "powerMainsFailure", None, Some("power"))
    },
    SensorDescription {
        is_on: window_open,
        ..sensor("window", "windowState", None, Some("opening"))
    },
];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    let mut entities: Vec<Box<dyn HmipEntity>> = vec![Box::new(CloudConnectionSensor {
        base: GenericEntity::for_home("CloudConnectionSensor"),
    })];

    for device in model.devices.values() {
        let multi_channel = device.functional_channels.len() > 2;
        for channel in device.functional_channels.values() {
            for description in CHANNEL_SENSORS {
                if !channel.has(description.vendor_key) {
                    continue;
                }
                let base = GenericEntity::for_channel(
                    &format!("HmipSensor_{}", description.key),
                    device,
                    channel,
                )
                .multi_channel(multi_channel)
                .post(description.name);
                entities.push(Box::new(ChannelSensor { base, description }));
            }
        }
    }

    for group in model.groups.values() {
        let scope = match group.group_type.as_str() {
            "SECURITY_ZONE" => SecurityScope::Zone,
            "SECURITY" => SecurityScope::Full,
            _ => continue,
        };
        entities.push(Box::new(SecurityGroupSensor::new(group, scope)));
    }

    entities
}

/// Whether the access point reaches the cloud.
pub struct CloudConnectionSensor {
    base: GenericEntity,
}

impl HmipEntity for CloudConnectionSensor {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn name(&self, ctx: &EntityContext<'_>) -> String {
        with_home_prefix(ctx, "Cloud Connection".to_string())
    }

    fn available(&self, _ctx: &EntityContext<'_>) -> bool {
        true
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        EntityValue::BinarySensor(BinarySensorState {
            on: Some(ctx.model.home.connected),
            device_class: Some("connectivity".to_string()),
        })
    }

    fn device_info(&self, model: &Model) -> Option<engine::Device> {
        let home = &model.home;
        let mut info = engine::Device::new(home.id.clone(), "Access Point".to_string());
        info.identifiers = vec![(DOMAIN.to_string(), home.id.clone())];
        info.manufacturer = Some("eQ-3".to_string());
        info.sw_version = home
            .attributes
            .get("currentAPVersion")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(info)
    }
}

/// One described key of a functional channel.
pub struct ChannelSensor {
    base: GenericEntity,
    description: &'static SensorDescription,
}

impl HmipEntity for ChannelSensor {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let on = self
            .base
            .channel(ctx.model)
            .and_then(|c| c.attr(self.description.vendor_key))
            .and_then(self.description.is_on);
        EntityValue::BinarySensor(BinarySensorState {
            on,
            device_class: self.description.device_class.map(str::to_string),
        })
    }

    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = self.base.attributes(ctx);
        if let Some(channel) = self.base.channel(ctx.model) {
            for (key, attr) in self.description.extra_attributes {
                copy_truthy(&mut attrs, attr, channel.attr(key).cloned());
            }
        }
        attrs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecurityScope {
    /// A single security zone
    Zone,
    /// The whole alarm system including technical alarms
    Full,
}

/// Aggregated alarm state of a security group.
pub struct SecurityGroupSensor {
    base: GenericEntity,
    scope: SecurityScope,
}

impl SecurityGroupSensor {
    fn new(group: &Group, scope: SecurityScope) -> Self {
        let base = match scope {
            SecurityScope::Zone => {
                GenericEntity::for_group("SecurityZoneSensorGroup", group, "SecurityZone")
            }
            SecurityScope::Full => GenericEntity::for_group("SecuritySensorGroup", group, "Sensors"),
        };
        Self { base, scope }
    }

    fn is_on(&self, group: &Group) -> bool {
        let set = |key| group.bool(key).unwrap_or(false);
        let window_open = group.str("windowState").is_some_and(|s| s != "CLOSED");

        let zone = set("motionDetected")
            || set("presenceDetected")
            || group.unreach.unwrap_or(false)
            || set("sabotage")
            || window_open;
        if self.scope == SecurityScope::Zone {
            return zone;
        }

        zone || set("powerMainsFailure")
            || set("moistureDetected")
            || set("waterlevelDetected")
            || set("lowBat")
            || set("dutyCycle")
            || group
                .str("smokeDetectorAlarmType")
                .is_some_and(|s| s != "IDLE_OFF")
    }
}

impl HmipEntity for SecurityGroupSensor {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn available(&self, _ctx: &EntityContext<'_>) -> bool {
        true
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        EntityValue::BinarySensor(BinarySensorState {
            on: self.base.group(ctx.model).map(|g| self.is_on(g)),
            device_class: Some("safety".to_string()),
        })
    }

    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = self.base.attributes(ctx);
        let Some(group) = self.base.group(ctx.model) else {
            return attrs;
        };

        for (key, attr) in GROUP_SENSOR_ATTRIBUTES {
            copy_truthy(&mut attrs, attr, group.attr(key));
        }
        if let Some(state) = group.str("windowState") {
            if !state.is_empty() && state != "CLOSED" {
                attrs.insert("window_state".to_string(), Value::from(state));
            }
        }

        if self.scope == SecurityScope::Full {
            match group.str("smokeDetectorAlarmType") {
                Some("PRIMARY_ALARM") => {
                    attrs.insert("smoke_detector_alarm".to_string(), Value::Bool(true));
                }
                Some("INTRUSION_ALARM") => {
                    attrs.insert("intrusion_alarm".to_string(), Value::Bool(true));
                }
                _ => {}
            }
        }
        attrs
    }
}

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::device::Device;

/// Host platform an entity belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Button,
    Light,
    Lock,
    Sensor,
    Switch,
    Weather,
}

/// State of a light entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightState {
    /// Whether the light is on or off.
    pub on: bool,

    /// Brightness level (0-255), if supported.
    pub brightness: Option<u8>,

    /// Hue (0-360) and saturation (0-100) for colour lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs_color: Option<(f64, f64)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

/// State of a switch entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,
}

/// State of a lock entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LockState {
    /// `None` when the lock cannot report a settled position.
    pub locked: Option<bool>,
    pub locking: bool,
    pub unlocking: bool,
}

/// State of a binary sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinarySensorState {
    /// Whether the sensor is active (meaning depends on device class:
    /// motion detected, door open, tamper triggered, etc.)
    ///
    /// `None` means the device reported no value.
    pub on: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

/// State of a numeric sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorState {
    /// `None` when the device currently reports no usable reading.
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
}

/// Current weather state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherState {
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_bearing: Option<f64>,
}

/// Platform specific part of an entity's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum EntityValue {
    BinarySensor(BinarySensorState),
    Button,
    Light(LightState),
    Lock(LockState),
    Sensor(SensorState),
    Switch(SwitchState),
    Weather(WeatherState),
}

impl EntityValue {
    pub fn platform(&self) -> Platform {
        match self {
            EntityValue::BinarySensor(_) => Platform::BinarySensor,
            EntityValue::Button => Platform::Button,
            EntityValue::Light(_) => Platform::Light,
            EntityValue::Lock(_) => Platform::Lock,
            EntityValue::Sensor(_) => Platform::Sensor,
            EntityValue::Switch(_) => Platform::Switch,
            EntityValue::Weather(_) => Platform::Weather,
        }
    }
}

/// Host-visible state of a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub name: String,
    pub available: bool,
    #[serde(flatten)]
    pub value: EntityValue,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: HashMap<String, EntityState>,
    pub devices: HashMap<String, Device>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_state_serializes_flat() {
        let state = EntityState {
            name: "Kitchen".to_string(),
            available: true,
            value: EntityValue::Light(LightState {
                on: true,
                brightness: Some(128),
                ..Default::default()
            }),
            attributes: serde_json::Map::new(),
        };

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["platform"], "light");
        assert_eq!(json["on"], true);
        assert_eq!(json["brightness"], 128);
        assert!(json.get("attributes").is_none());
        assert!(json.get("hs_color").is_none());
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::BinarySensor.to_string(), "binary_sensor");
        assert_eq!("lock".parse::<Platform>().unwrap(), Platform::Lock);
        assert_eq!(
            EntityValue::Weather(WeatherState::default()).platform(),
            Platform::Weather
        );
        assert_eq!(Platform::Sensor.to_string(), "sensor");
    }
}

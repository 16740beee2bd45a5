use super::client::Action;
use super::client::RgbColor;
use super::entity::Attributes;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::Device;
use super::model::FunctionalChannel;
use super::model::Model;
use crate::engine::EntityCommand;
use crate::engine::EntityValue;
use crate::engine::LightState;
use crate::engine::Platform;

/// Dimmer channel types and whether they are named per channel.
const CHANNEL_TYPES: &[(&str, bool)] = &[
    ("DIMMER_CHANNEL", false),
    ("MULTI_MODE_INPUT_DIMMER_CHANNEL", true),
];

const NOTIFICATION_LIGHT_CHANNEL: &str = "NOTIFICATION_LIGHT_CHANNEL";

/// Firmware above this drives notification lights through optical signals.
const OPTICAL_SIGNAL_FIRMWARE: [u64; 3] = [2, 0, 0];

/// Lowest brightness a notification light accepts; below it the LED is disabled.
const MIN_NOTIFICATION_BRIGHTNESS: u8 = 10;

const RAMP_TIME: f64 = 0.5;

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    let types: Vec<&str> = CHANNEL_TYPES.iter().map(|(t, _)| *t).collect();
    let dimmers = channels_of_type(model, &types).map(|(device, channel)| {
        let multi_channel = CHANNEL_TYPES
            .iter()
            .any(|(t, multi)| *multi && *t == channel.functional_channel_type);
        Box::new(Dimmer {
            base: GenericEntity::for_channel("Dimmer", device, channel)
                .multi_channel(multi_channel),
        }) as Box<dyn HmipEntity>
    });

    let notification_lights = channels_of_type(model, &[NOTIFICATION_LIGHT_CHANNEL]).map(
        |(device, channel)| Box::new(NotificationLight::new(device, channel)) as Box<dyn HmipEntity>,
    );

    dimmers.chain(notification_lights).collect()
}

/// Host brightness (0-255) for a vendor dim level (0.0-1.0).
fn brightness(dim_level: f64) -> u8 {
    (dim_level * 255.0) as u8
}

fn dim_level(brightness: u8) -> f64 {
    f64::from(brightness) / 255.0
}

pub struct Dimmer {
    base: GenericEntity,
}

impl HmipEntity for Dimmer {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let dim_level = self.base.channel(ctx.model).and_then(|c| c.f64("dimLevel"));
        EntityValue::Light(LightState {
            on: dim_level.is_some_and(|d| d > 0.0),
            brightness: dim_level.map(brightness),
            ..Default::default()
        })
    }

    fn action(&self, _model: &Model, command: &EntityCommand) -> Option<Action> {
        let dim_level = match command {
            EntityCommand::TurnOn { brightness, .. } => brightness.map_or(1.0, dim_level),
            EntityCommand::TurnOff => 0.0,
            EntityCommand::SetValue { value } => *value,
            _ => return None,
        };
        Some(Action::SetDimLevel {
            device_id: self.base.device_id()?.to_string(),
            channel_index: self.base.channel_index()?,
            dim_level,
        })
    }
}

/// Hue and saturation shown for a vendor colour.
fn hs_color(color: &str) -> (f64, f64) {
    match color.parse::<RgbColor>() {
        Ok(RgbColor::White) => (0.0, 0.0),
        Ok(RgbColor::Red) => (0.0, 100.0),
        Ok(RgbColor::Yellow) => (60.0, 100.0),
        Ok(RgbColor::Green) => (120.0, 100.0),
        Ok(RgbColor::Turquoise) => (180.0, 100.0),
        Ok(RgbColor::Blue) => (240.0, 100.0),
        Ok(RgbColor::Purple) => (300.0, 100.0),
        Ok(RgbColor::Black) | Err(_) => (0.0, 0.0),
    }
}

/// Nearest of the few colours the hardware can show.
fn convert_color((hue, saturation): (f64, f64)) -> RgbColor {
    let hue = hue as i64;
    if (saturation as i64) < 5 {
        return RgbColor::White;
    }
    if 30 < hue && hue <= 90 {
        RgbColor::Yellow
    } else if 90 < hue && hue <= 160 {
        RgbColor::Green
    } else if 150 < hue && hue <= 210 {
        RgbColor::Turquoise
    } else if 210 < hue && hue <= 270 {
        RgbColor::Blue
    } else if 270 < hue && hue <= 330 {
        RgbColor::Purple
    } else {
        RgbColor::Red
    }
}

/// Dotted numeric version compare; a missing or unparsable version is old firmware.
fn has_optical_signal(device: &Device) -> bool {
    let Some(version) = device.firmware_version.as_deref() else {
        return false;
    };
    let parts: Result<Vec<u64>, _> = version.split('.').map(str::parse::<u64>).collect();
    parts.is_ok_and(|parts| parts.as_slice() > OPTICAL_SIGNAL_FIRMWARE.as_slice())
}

/// RGB light on a notification channel, such as the top and bottom of a BSL switch.
///
/// Firmware above 2.0.0 switches with optical signal behaviours instead of a
/// dim level and reports its own on flag.
pub struct NotificationLight {
    base: GenericEntity,
    optical_signal: bool,
}

impl NotificationLight {
    fn new(device: &Device, channel: &FunctionalChannel) -> Self {
        let optical_signal = has_optical_signal(device);
        let kind = if optical_signal {
            "NotificationLightV2"
        } else {
            "NotificationLight"
        };
        Self {
            base: GenericEntity::for_channel(kind, device, channel).multi_channel(true),
            optical_signal,
        }
    }

    fn is_on(&self, channel: &FunctionalChannel) -> bool {
        if self.optical_signal {
            channel.bool("on").unwrap_or(false)
        } else {
            channel.f64("dimLevel").is_some_and(|d| d > 0.0)
        }
    }

    fn current_color(channel: &FunctionalChannel) -> RgbColor {
        channel
            .str("simpleRGBColorState")
            .and_then(|c| c.parse().ok())
            .unwrap_or(RgbColor::White)
    }
}

impl HmipEntity for NotificationLight {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let Some(channel) = self.base.channel(ctx.model) else {
            return EntityValue::Light(LightState::default());
        };
        EntityValue::Light(LightState {
            on: self.is_on(channel),
            brightness: Some(brightness(channel.f64("dimLevel").unwrap_or(0.0))),
            hs_color: channel.str("simpleRGBColorState").map(hs_color),
            effect: if self.optical_signal {
                channel.str("opticalSignalBehaviour").map(str::to_string)
            } else {
                None
            },
        })
    }

    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = self.base.attributes(ctx);
        if let Some(channel) = self.base.channel(ctx.model) {
            if self.is_on(channel) {
                if let Some(color) = channel.attr("simpleRGBColorState") {
                    attrs.insert("color_name".to_string(), color.clone());
                }
            }
        }
        attrs
    }

    fn action(&self, model: &Model, command: &EntityCommand) -> Option<Action> {
        let channel = self.base.channel(model)?;
        let device_id = self.base.device_id()?.to_string();
        let channel_index = self.base.channel_index()?;
        let current_hs = channel
            .str("simpleRGBColorState")
            .map_or((0.0, 0.0), hs_color);

        match (command, self.optical_signal) {
            (
                EntityCommand::TurnOn {
                    brightness: requested,
                    hs_color,
                    effect,
                },
                false,
            ) => {
                let level = match (requested, hs_color, effect) {
                    (None, None, None) => u8::MAX,
                    _ => requested.unwrap_or_else(|| {
                        brightness(channel.f64("dimLevel").unwrap_or(0.0))
                    }),
                };
                Some(Action::SetRgbDimLevelWithTime {
                    device_id,
                    channel_index,
                    color: convert_color(hs_color.unwrap_or(current_hs)),
                    dim_level: dim_level(level.max(MIN_NOTIFICATION_BRIGHTNESS)),
                    on_time: 0.0,
                    ramp_time: RAMP_TIME,
                })
            }
            (EntityCommand::TurnOff, false) => Some(Action::SetRgbDimLevelWithTime {
                device_id,
                channel_index,
                color: Self::current_color(channel),
                dim_level: 0.0,
                on_time: 0.0,
                ramp_time: RAMP_TIME,
            }),
            (
                EntityCommand::TurnOn {
                    brightness: requested,
                    hs_color,
                    effect,
                },
                true,
            ) => {
                let level = requested.unwrap_or(u8::MAX).max(MIN_NOTIFICATION_BRIGHTNESS);
                let behaviour = effect
                    .clone()
                    .or_else(|| channel.str("opticalSignalBehaviour").map(str::to_string))
                    .unwrap_or_else(|| "ON".to_string());
                Some(Action::SetOpticalSignal {
                    device_id,
                    channel_index,
                    behaviour,
                    color: convert_color(hs_color.unwrap_or(current_hs)),
                    dim_level: (dim_level(level) * 100.0).round() / 100.0,
                })
            }
            (EntityCommand::TurnOff, true) => Some(Action::SetOpticalSignal {
                device_id,
                channel_index,
                behaviour: "OFF".to_string(),
                color: Self::current_color(channel),
                dim_level: 0.0,
            }),
            _ => None,
        }
    }
}

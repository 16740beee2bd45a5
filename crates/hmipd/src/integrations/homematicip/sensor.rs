//! Numeric channel readings: climate, wind, light, energy and valve position.

use super::entity::Attributes;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::FunctionalChannel;
use super::model::Model;
use crate::engine::EntityValue;
use crate::engine::Platform;
use crate::engine::SensorState;

const ESI_IEC: &str = "ES_IEC";
const ESI_LED: &str = "ES_LED";
const ESI_GAS: &str = "ES_GAS";

/// A numeric value read from a functional channel.
struct SensorDescription {
    key: &'static str,
    /// Appended to the device label
    name: Option<&'static str>,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
    value: fn(&FunctionalChannel) -> Option<f64>,
    exists: fn(&FunctionalChannel) -> bool,
    extra_attributes: &'static [(&'static str, &'static str)],
}

const fn sensor(
    key: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    value: fn(&FunctionalChannel) -> Option<f64>,
    exists: fn(&FunctionalChannel) -> bool,
) -> SensorDescription {
    SensorDescription {
        key,
        name: Some(name),
        unit,
        device_class,
        state_class: Some("measurement"),
        value,
        exists,
        extra_attributes: &[],
    }
}

const TEMPERATURE_ATTRIBUTES: &[(&str, &str)] = &[("temperatureOffset", "temperature_offset")];

const COUNTER_ATTRIBUTES: &[(&str, &str)] = &[
    ("leftCounter", "left_counter"),
    ("rightCounter", "right_counter"),
];

/// Reads and presence checks for one vendor key.
macro_rules! key {
    ($read:ident, $has:ident, $key:literal) => {
        fn $read(channel: &FunctionalChannel) -> Option<f64> {
            channel.f64($key)
        }

        fn $has(channel: &FunctionalChannel) -> bool {
            channel.has($key)
        }
    };
}

key!(humidity, has_humidity, "humidity");
key!(actual_temperature, has_actual_temperature, "actualTemperature");
key!(valve_temperature, has_valve_temperature, "valveActualTemperature");
key!(wind_speed, has_wind_speed, "windSpeed");
key!(wind_direction, has_wind_direction, "windDirection");
key!(wind_variation, has_wind_variation, "windDirectionVariation");
key!(illumination, has_illumination, "illumination");
key!(average_illumination, has_average_illumination, "averageIllumination");
key!(current_illumination, has_current_illumination, "currentIllumination");
key!(highest_illumination, has_highest_illumination, "highestIllumination");
key!(lowest_illumination, has_lowest_illumination, "lowestIllumination");
key!(duty_cycle, has_duty_cycle, "dutyCycleLevel");
key!(counter_delta, has_counter_delta, "leftRightCounterDelta");
key!(external_one, has_external_one, "temperatureExternalOne");
key!(external_two, has_external_two, "temperatureExternalTwo");
key!(external_delta, has_external_delta, "temperatureExternalDelta");
key!(power, has_power, "currentPowerConsumption");
key!(energy_counter, has_energy_counter, "energyCounter");
key!(today_sunshine, has_today_sunshine, "todaySunshineDuration");
key!(total_sunshine, has_total_sunshine, "totalSunshineDuration");

fn has_temperature(channel: &FunctionalChannel) -> bool {
    channel.has("temperature")
}

fn today_rain(channel: &FunctionalChannel) -> Option<f64> {
    channel
        .f64("todayRainCounter")
        .map(|mm| (mm * 100.0).round() / 100.0)
}

fn has_today_rain(channel: &FunctionalChannel) -> bool {
    channel.has("todayRainCounter")
}

fn energy_counter_one(channel: &FunctionalChannel) -> Option<f64> {
    channel.f64("energyCounterOne")
}

fn energy_counter_two(channel: &FunctionalChannel) -> Option<f64> {
    channel.f64("energyCounterTwo")
}

fn energy_counter_three(channel: &FunctionalChannel) -> Option<f64> {
    channel.f64("energyCounterThree")
}

fn gas_flow(channel: &FunctionalChannel) -> Option<f64> {
    channel.f64("currentGasFlow")
}

fn gas_volume(channel: &FunctionalChannel) -> Option<f64> {
    channel.f64("gasVolume")
}

fn is_set(channel: &FunctionalChannel, key: &str) -> bool {
    channel.attr(key).is_some_and(|v| !v.is_null())
}

fn energy_sensor(channel: &FunctionalChannel, sensor_type: &str) -> bool {
    channel.str("connectedEnergySensorType") == Some(sensor_type)
}

/// Counter slot is wired unless its type is reported as unknown.
fn counter_known(channel: &FunctionalChannel, type_key: &str) -> bool {
    channel.str(type_key) != Some("UNKNOWN")
}

fn iec_power(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_IEC) && is_set(channel, "currentPowerConsumption")
}

fn iec_high_tariff(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_IEC) && counter_known(channel, "energyCounterOneType")
}

fn iec_low_tariff(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_IEC) && counter_known(channel, "energyCounterTwoType")
}

fn iec_single_tariff(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_IEC) && counter_known(channel, "energyCounterThreeType")
}

fn led_power(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_LED) && is_set(channel, "currentPowerConsumption")
}

fn led_high_tariff(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_LED) && is_set(channel, "energyCounterOne")
}

fn gas_flow_set(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_GAS) && is_set(channel, "currentGasFlow")
}

fn gas_volume_set(channel: &FunctionalChannel) -> bool {
    energy_sensor(channel, ESI_GAS) && is_set(channel, "gasVolume")
}

const CELSIUS: Option<&str> = Some("°C");
const LUX: Option<&str> = Some("lx");
const PERCENT: Option<&str> = Some("%");
const KWH: Option<&str> = Some("kWh");
const WATT: Option<&str> = Some("W");

const TEMPERATURE: Option<&str> = Some("temperature");
const ILLUMINANCE: Option<&str> = Some("illuminance");
const ENERGY: Option<&str> = Some("energy");
const POWER: Option<&str> = Some("power");

const TOTAL_INCREASING: Option<&str> = Some("total_increasing");

const CHANNEL_SENSORS: &[SensorDescription] = &[
    sensor(
        "humidity",
        "Humidity",
        PERCENT,
        Some("humidity"),
        humidity,
        has_humidity,
    ),
    sensor(
        "temperature",
        "Temperature",
        CELSIUS,
        TEMPERATURE,
        actual_temperature,
        has_temperature,
    ),
    SensorDescription {
        extra_attributes: TEMPERATURE_ATTRIBUTES,
        ..sensor(
            "actual_temperature",
            "Temperature",
            CELSIUS,
            TEMPERATURE,
            actual_temperature,
            has_actual_temperature,
        )
    },
    SensorDescription {
        extra_attributes: TEMPERATURE_ATTRIBUTES,
        ..sensor(
            "valve_actual_temperature",
            "Temperature",
            CELSIUS,
            TEMPERATURE,
            valve_temperature,
            has_valve_temperature,
        )
    },
    SensorDescription {
        state_class: None,
        ..sensor(
            "windspeed",
            "Windspeed",
            Some("km/h"),
            Some("wind_speed"),
            wind_speed,
            has_wind_speed,
        )
    },
    sensor(
        "wind_direction",
        "Wind Direction",
        Some("°"),
        None,
        wind_direction,
        has_wind_direction,
    ),
    sensor(
        "wind_direction_variation",
        "Wind Direction Variation",
        Some("°"),
        None,
        wind_variation,
        has_wind_variation,
    ),
    sensor(
        "illuminance",
        "Illuminance",
        LUX,
        ILLUMINANCE,
        illumination,
        has_illumination,
    ),
    SensorDescription {
        state_class: None,
        ..sensor(
            "today_rain",
            "Today Rain",
            Some("mm"),
            Some("precipitation"),
            today_rain,
            has_today_rain,
        )
    },
    sensor(
        "average_illumination",
        "Average Illumination",
        LUX,
        ILLUMINANCE,
        average_illumination,
        has_average_illumination,
    ),
    sensor(
        "current_illumination",
        "Current Illumination",
        LUX,
        ILLUMINANCE,
        current_illumination,
        has_current_illumination,
    ),
    sensor(
        "highest_illumination",
        "Highest Illumination",
        LUX,
        ILLUMINANCE,
        highest_illumination,
        has_highest_illumination,
    ),
    sensor(
        "lowest_illumination",
        "Lowest Illumination",
        LUX,
        ILLUMINANCE,
        lowest_illumination,
        has_lowest_illumination,
    ),
    sensor(
        "duty_cycle",
        "Duty Cycle",
        PERCENT,
        None,
        duty_cycle,
        has_duty_cycle,
    ),
    SensorDescription {
        key: "left_right_counter_delta",
        name: None,
        unit: None,
        device_class: None,
        state_class: None,
        value: counter_delta,
        exists: has_counter_delta,
        extra_attributes: COUNTER_ATTRIBUTES,
    },
    sensor(
        "ext_1_temperature",
        "External 1 Temperature",
        CELSIUS,
        TEMPERATURE,
        external_one,
        has_external_one,
    ),
    sensor(
        "ext_2_temperature",
        "External 2 Temperature",
        CELSIUS,
        TEMPERATURE,
        external_two,
        has_external_two,
    ),
    sensor(
        "ext_delta_temperature",
        "Delta Temperature",
        CELSIUS,
        TEMPERATURE,
        external_delta,
        has_external_delta,
    ),
    sensor("power", "Power", WATT, POWER, power, has_power),
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "energy_counter",
            "Energy Counter",
            KWH,
            ENERGY,
            energy_counter,
            has_energy_counter,
        )
    },
    // Energy sensor interface, by the meter wired to it
    sensor(
        "current_power_consumption",
        "CurrentPowerConsumption",
        WATT,
        POWER,
        power,
        iec_power,
    ),
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "energy_counter_usage_high_tariff",
            "ENERGY_COUNTER_USAGE_HIGH_TARIFF",
            KWH,
            ENERGY,
            energy_counter_one,
            iec_high_tariff,
        )
    },
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "energy_counter_usage_low_tariff",
            "ENERGY_COUNTER_USAGE_LOW_TARIFF",
            KWH,
            ENERGY,
            energy_counter_two,
            iec_low_tariff,
        )
    },
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "energy_counter_input_single_tariff",
            "ENERGY_COUNTER_INPUT_SINGLE_TARIFF",
            KWH,
            ENERGY,
            energy_counter_three,
            iec_single_tariff,
        )
    },
    sensor(
        "current_power_consumption",
        "CurrentPowerConsumption",
        WATT,
        POWER,
        power,
        led_power,
    ),
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "energy_counter_usage_high_tariff",
            "ENERGY_COUNTER_USAGE_HIGH_TARIFF",
            KWH,
            ENERGY,
            energy_counter_one,
            led_high_tariff,
        )
    },
    sensor(
        "current_gas_flow",
        "CurrentGasFlow",
        Some("m³/h"),
        Some("volume_flow_rate"),
        gas_flow,
        gas_flow_set,
    ),
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "gas_volume",
            "GasVolume",
            Some("m³"),
            Some("volume"),
            gas_volume,
            gas_volume_set,
        )
    },
    SensorDescription {
        state_class: Some("total"),
        ..sensor(
            "today_sunshine_duration",
            "Today Sunshine Duration",
            Some("min"),
            None,
            today_sunshine,
            has_today_sunshine,
        )
    },
    SensorDescription {
        state_class: TOTAL_INCREASING,
        ..sensor(
            "total_sunshine_duration",
            "Total Sunshine Duration",
            Some("min"),
            None,
            total_sunshine,
            has_total_sunshine,
        )
    },
];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    let mut entities: Vec<Box<dyn HmipEntity>> = Vec::new();

    for device in model.devices.values() {
        for channel in device.functional_channels.values() {
            for description in CHANNEL_SENSORS {
                if !(description.exists)(channel) {
                    continue;
                }
                let base = GenericEntity::for_channel(
                    &format!("HmipSensorEntity_{}", description.key),
                    device,
                    channel,
                )
                .post(description.name);
                entities.push(Box::new(ChannelSensor { base, description }));
            }
        }
    }

    for (device, channel) in channels_of_type(model, &["HEATING_THERMOSTAT_CHANNEL"]) {
        entities.push(Box::new(HeatingThermostat {
            base: GenericEntity::for_channel("HeatingThermostat", device, channel)
                .post(Some("Heating")),
        }));
    }

    entities
}

/// One described reading of a functional channel.
pub struct ChannelSensor {
    base: GenericEntity,
    description: &'static SensorDescription,
}

impl HmipEntity for ChannelSensor {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let description = self.description;
        EntityValue::Sensor(SensorState {
            value: self.base.channel(ctx.model).and_then(description.value),
            unit: description.unit.map(str::to_string),
            device_class: description.device_class.map(str::to_string),
            state_class: description.state_class.map(str::to_string),
        })
    }

    /// Extra keys are copied whenever the channel carries them, even unset.
    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = self.base.attributes(ctx);
        if let Some(channel) = self.base.channel(ctx.model) {
            for (key, attr) in self.description.extra_attributes {
                if let Some(value) = channel.attr(key) {
                    attrs.insert(attr.to_string(), value.clone());
                }
            }
        }
        attrs
    }
}

/// Valve opening of a radiator thermostat, in percent.
pub struct HeatingThermostat {
    base: GenericEntity,
}

impl HmipEntity for HeatingThermostat {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    /// Unknown until the valve finished adapting to the radiator.
    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let value = self
            .base
            .channel(ctx.model)
            .filter(|c| c.str("valveState") == Some("ADAPTION_DONE"))
            .and_then(|c| c.f64("valvePosition"))
            .map(|position| (position * 100.0).round());
        EntityValue::Sensor(SensorState {
            value,
            unit: PERCENT.map(str::to_string),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::integrations::homematicip::fixtures;
    use crate::integrations::homematicip::fixtures::ESI_ID;
    use crate::integrations::homematicip::fixtures::THERMOSTAT_ID;

    fn ctx(model: &Model) -> EntityContext<'_> {
        EntityContext {
            model,
            connected: true,
            home_name: None,
        }
    }

    fn summary(model: &Model) -> String {
        let ctx = ctx(model);
        entities(model)
            .iter()
            .map(|e| {
                let EntityValue::Sensor(state) = e.value(&ctx) else {
                    unreachable!()
                };
                format!(
                    "{} | {} | {:?} {} | {}",
                    e.name(&ctx),
                    e.unique_id(),
                    state.value,
                    state.unit.as_deref().unwrap_or("-"),
                    state.device_class.as_deref().unwrap_or("-"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn set(model: &mut Model, device_id: &str, key: &str, value: Value) {
        model
            .devices
            .get_mut(device_id)
            .unwrap()
            .functional_channels
            .get_mut(&1)
            .unwrap()
            .attributes
            .insert(key.to_string(), value);
    }

    #[test]
    fn test_sensor_entities() {
        let model = fixtures::model();
        insta::assert_snapshot!(summary(&model), @r"
        Kitchen Plug Energy Counter | HmipSensorEntity_energy_counter_Channel1_3014F711A0000000000000A1 | Some(6.33) kWh | energy
        Garden Weather Humidity | HmipSensorEntity_humidity_Channel1_3014F711A0000000000000A6 | Some(65.0) % | humidity
        Garden Weather Temperature | HmipSensorEntity_actual_temperature_Channel1_3014F711A0000000000000A6 | Some(15.4) °C | temperature
        Garden Weather Windspeed | HmipSensorEntity_windspeed_Channel1_3014F711A0000000000000A6 | Some(2.6) km/h | wind_speed
        Garden Weather Wind Direction | HmipSensorEntity_wind_direction_Channel1_3014F711A0000000000000A6 | Some(295.0) ° | -
        Bedroom Radiator Temperature | HmipSensorEntity_valve_actual_temperature_Channel1_3014F711A0000000000000A8 | Some(20.5) °C | temperature
        Energy Meter Power | HmipSensorEntity_power_Channel1_3014F711A0000000000000A9 | Some(432.0) W | power
        Energy Meter CurrentPowerConsumption | HmipSensorEntity_current_power_consumption_Channel1_3014F711A0000000000000A9 | Some(432.0) W | power
        Energy Meter ENERGY_COUNTER_USAGE_HIGH_TARIFF | HmipSensorEntity_energy_counter_usage_high_tariff_Channel1_3014F711A0000000000000A9 | Some(194.0) kWh | energy
        Energy Meter ENERGY_COUNTER_INPUT_SINGLE_TARIFF | HmipSensorEntity_energy_counter_input_single_tariff_Channel1_3014F711A0000000000000A9 | Some(3.0) kWh | energy
        Bedroom Radiator Heating | HeatingThermostat_Channel1_3014F711A0000000000000A8 | Some(32.0) % | -
        ");
    }

    #[test]
    fn test_temperature_offset_attribute() {
        let model = fixtures::model();
        let sensors = entities(&model);
        let radiator = sensors
            .iter()
            .find(|e| e.unique_id().starts_with("HmipSensorEntity_valve_actual"))
            .unwrap();
        let attrs = radiator.attributes(&ctx(&model));
        // Copied although zero
        assert_eq!(attrs["temperature_offset"], 0.0);
        assert_eq!(attrs["id"], THERMOSTAT_ID);

        let weather = sensors
            .iter()
            .find(|e| e.unique_id().starts_with("HmipSensorEntity_actual_temperature"))
            .unwrap();
        assert!(
            !weather
                .attributes(&ctx(&model))
                .contains_key("temperature_offset")
        );
    }

    #[test]
    fn test_heating_thermostat_waits_for_adaption() {
        let mut model = fixtures::model();
        set(
            &mut model,
            THERMOSTAT_ID,
            "valveState",
            "ADJUSTMENT_TOO_SMALL".into(),
        );
        let thermostat = entities(&model).pop().unwrap();
        assert_eq!(
            thermostat.value(&ctx(&model)),
            EntityValue::Sensor(SensorState {
                value: None,
                unit: Some("%".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_energy_meter_follows_connected_sensor() {
        let mut model = fixtures::model();
        set(&mut model, ESI_ID, "connectedEnergySensorType", "ES_GAS".into());
        set(&mut model, ESI_ID, "currentGasFlow", 1.25.into());
        set(&mut model, ESI_ID, "gasVolume", 1024.5.into());

        let ctx = ctx(&model);
        let meter: Vec<String> = entities(&model)
            .iter()
            .filter(|e| e.base().device_id() == Some(ESI_ID))
            .map(|e| e.name(&ctx))
            .collect();
        assert_eq!(
            meter,
            vec![
                "Energy Meter Power",
                "Energy Meter CurrentGasFlow",
                "Energy Meter GasVolume",
            ]
        );
    }

    #[test]
    fn test_rain_and_counter_delta() {
        let mut model = fixtures::model();
        set(&mut model, fixtures::WEATHER_ID, "todayRainCounter", 3.14159.into());
        set(&mut model, fixtures::WEATHER_ID, "leftRightCounterDelta", 4.into());
        set(&mut model, fixtures::WEATHER_ID, "leftCounter", 10.into());
        set(&mut model, fixtures::WEATHER_ID, "rightCounter", Value::Null);

        let ctx = ctx(&model);
        let sensors = entities(&model);
        let by_key = |key: &str| {
            sensors
                .iter()
                .find(|e| {
                    e.unique_id()
                        .starts_with(&format!("HmipSensorEntity_{key}_Channel"))
                })
                .unwrap()
        };

        let rain = by_key("today_rain");
        assert_eq!(rain.name(&ctx), "Garden Weather Today Rain");
        let EntityValue::Sensor(state) = rain.value(&ctx) else {
            unreachable!()
        };
        assert_eq!(state.value, Some(3.14));
        assert_eq!(state.state_class, None);

        let delta = by_key("left_right_counter_delta");
        assert_eq!(delta.name(&ctx), "Garden Weather");
        let attrs = delta.attributes(&ctx);
        assert_eq!(attrs["left_counter"], 10);
        assert_eq!(attrs["right_counter"], Value::Null);
    }
}

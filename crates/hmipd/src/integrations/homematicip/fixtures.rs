//! Test home covering every mapped platform.

use super::model::Model;

pub const PLUG_ID: &str = "3014F711A0000000000000A1";
pub const IO_BOX_ID: &str = "3014F711A0000000000000A2";
pub const DIMMER_ID: &str = "3014F711A0000000000000A3";
pub const LOCK_ID: &str = "3014F711A0000000000000A4";
pub const CONTACT_ID: &str = "3014F711A0000000000000A5";
pub const WEATHER_ID: &str = "3014F711A0000000000000A6";
pub const GARAGE_ID: &str = "3014F711A0000000000000A7";
pub const THERMOSTAT_ID: &str = "3014F711A0000000000000A8";
pub const ESI_ID: &str = "3014F711A0000000000000A9";
pub const NOTIFICATION_ID: &str = "3014F711A0000000000000AA";

pub const CURRENT_STATE: &str = r#"{
    "home": {
        "id": "home-1",
        "connected": true,
        "weather": {
            "temperature": 16.3,
            "humidity": 54,
            "windSpeed": 8.568,
            "windDirection": 294,
            "weatherCondition": "LIGHT_CLOUDY"
        },
        "location": { "city": "1010  Wien, Österreich" },
        "currentAPVersion": "2.2.18"
    },
    "devices": {
        "3014F711A0000000000000A1": {
            "id": "3014F711A0000000000000A1",
            "label": "Kitchen Plug",
            "type": "PLUGABLE_SWITCH_MEASURING",
            "modelType": "HMIP-PSM",
            "oem": "eQ-3",
            "firmwareVersion": "2.6.2",
            "homeId": "home-1",
            "connectionType": "HMIP_RF",
            "functionalChannels": {
                "0": {
                    "index": 0,
                    "functionalChannelType": "DEVICE_BASE",
                    "unreach": false,
                    "rssiDeviceValue": -60,
                    "dutyCycle": false,
                    "configPending": false
                },
                "1": {
                    "index": 1,
                    "functionalChannelType": "SWITCH_MEASURING_CHANNEL",
                    "label": "",
                    "on": true,
                    "energyCounter": 6.33
                }
            }
        },
        "3014F711A0000000000000A2": {
            "id": "3014F711A0000000000000A2",
            "label": "IO Box",
            "modelType": "HmIP-MIOB",
            "oem": "eQ-3",
            "firmwareVersion": "1.0.10",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": { "index": 1, "functionalChannelType": "SWITCH_CHANNEL", "label": "Pump", "on": false },
                "2": { "index": 2, "functionalChannelType": "SWITCH_CHANNEL", "label": "", "on": true }
            }
        },
        "3014F711A0000000000000A3": {
            "id": "3014F711A0000000000000A3",
            "label": "Hall Dimmer",
            "modelType": "HmIP-BDT",
            "oem": "eQ-3",
            "firmwareVersion": "1.4.8",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": { "index": 1, "functionalChannelType": "DIMMER_CHANNEL", "dimLevel": 0.5 }
            }
        },
        "3014F711A0000000000000A4": {
            "id": "3014F711A0000000000000A4",
            "label": "Front Door",
            "modelType": "HmIP-DLD",
            "oem": "eQ-3",
            "firmwareVersion": "1.4.12",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": {
                    "index": 1,
                    "functionalChannelType": "DOOR_LOCK_CHANNEL",
                    "lockState": "LOCKED",
                    "motorState": "STOPPED",
                    "autoRelockDelay": 180.0,
                    "doorHandleType": "LEVER",
                    "doorLockTurns": null
                }
            }
        },
        "3014F711A0000000000000A5": {
            "id": "3014F711A0000000000000A5",
            "label": "Window Bath",
            "modelType": "HmIP-SWDO",
            "oem": "eQ-3",
            "firmwareVersion": "1.2.12",
            "homeId": "home-1",
            "functionalChannels": {
                "0": {
                    "index": 0,
                    "functionalChannelType": "DEVICE_OPERATIONLOCK",
                    "unreach": false,
                    "lowBat": false,
                    "sabotage": false
                },
                "1": {
                    "index": 1,
                    "functionalChannelType": "SHUTTER_CONTACT_CHANNEL",
                    "windowState": "OPEN",
                    "eventDelay": 0
                }
            }
        },
        "3014F711A0000000000000A6": {
            "id": "3014F711A0000000000000A6",
            "label": "Garden Weather",
            "modelType": "HmIP-SWO-PR",
            "oem": "eQ-3",
            "firmwareVersion": "1.0.10",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": {
                    "index": 1,
                    "functionalChannelType": "WEATHER_SENSOR_PRO_CHANNEL",
                    "actualTemperature": 15.4,
                    "humidity": 65,
                    "windSpeed": 2.6,
                    "windDirection": 295.0,
                    "raining": false,
                    "storm": false,
                    "sunshine": true
                }
            }
        },
        "3014F711A0000000000000A7": {
            "id": "3014F711A0000000000000A7",
            "label": "Garage",
            "modelType": "HmIP-WGC",
            "oem": "eQ-3",
            "firmwareVersion": "1.0.2",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": { "index": 1, "functionalChannelType": "IMPULSE_OUTPUT_CHANNEL" }
            }
        },
        "3014F711A0000000000000A8": {
            "id": "3014F711A0000000000000A8",
            "label": "Bedroom Radiator",
            "modelType": "HmIP-eTRV-2",
            "oem": "eQ-3",
            "firmwareVersion": "2.2.8",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": {
                    "index": 1,
                    "functionalChannelType": "HEATING_THERMOSTAT_CHANNEL",
                    "valvePosition": 0.32,
                    "valveState": "ADAPTION_DONE",
                    "valveActualTemperature": 20.5,
                    "temperatureOffset": 0.0,
                    "setPointTemperature": 21.0
                }
            }
        },
        "3014F711A0000000000000A9": {
            "id": "3014F711A0000000000000A9",
            "label": "Energy Meter",
            "modelType": "HmIP-ESI",
            "oem": "eQ-3",
            "firmwareVersion": "1.0.6",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "1": {
                    "index": 1,
                    "functionalChannelType": "ENERGY_SENSORS_INTERFACE_CHANNEL",
                    "connectedEnergySensorType": "ES_IEC",
                    "currentPowerConsumption": 432,
                    "energyCounterOne": 194.0,
                    "energyCounterOneType": "ENERGY_COUNTER_USAGE_HIGH_TARIFF",
                    "energyCounterTwo": 0.0,
                    "energyCounterTwoType": "UNKNOWN",
                    "energyCounterThree": 3.0,
                    "energyCounterThreeType": "ENERGY_COUNTER_INPUT_SINGLE_TARIFF",
                    "currentGasFlow": null,
                    "gasVolume": null
                }
            }
        },
        "3014F711A0000000000000AA": {
            "id": "3014F711A0000000000000AA",
            "label": "Bathroom Light",
            "modelType": "HmIP-BSL",
            "oem": "eQ-3",
            "firmwareVersion": "2.2.6",
            "homeId": "home-1",
            "functionalChannels": {
                "0": { "index": 0, "functionalChannelType": "DEVICE_BASE", "unreach": false },
                "2": {
                    "index": 2,
                    "functionalChannelType": "NOTIFICATION_LIGHT_CHANNEL",
                    "label": "Bathroom Top",
                    "dimLevel": 0.5,
                    "on": true,
                    "simpleRGBColorState": "GREEN",
                    "opticalSignalBehaviour": "ON"
                },
                "3": {
                    "index": 3,
                    "functionalChannelType": "NOTIFICATION_LIGHT_CHANNEL",
                    "label": "",
                    "dimLevel": 0.0,
                    "on": false,
                    "simpleRGBColorState": "BLACK"
                }
            }
        }
    },
    "groups": {
        "group-1": {
            "id": "group-1",
            "label": "Living",
            "type": "SWITCHING",
            "on": false,
            "unreach": false
        },
        "group-2": {
            "id": "group-2",
            "label": "Alarm",
            "type": "SECURITY",
            "motionDetected": null,
            "presenceDetected": null,
            "powerMainsFailure": null,
            "moistureDetected": null,
            "waterlevelDetected": null,
            "lowBat": false,
            "dutyCycle": false,
            "sabotage": false,
            "smokeDetectorAlarmType": "IDLE_OFF",
            "windowState": "CLOSED",
            "unreach": false
        },
        "group-3": {
            "id": "group-3",
            "label": "Internal",
            "type": "SECURITY_ZONE",
            "motionDetected": false,
            "presenceDetected": false,
            "sabotage": false,
            "windowState": "OPEN",
            "unreach": false
        }
    }
}"#;

pub fn model() -> Model {
    serde_json::from_str(CURRENT_STATE).unwrap()
}

use super::entity::Attributes;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::Model;
use crate::engine::EntityValue;
use crate::engine::Platform;
use crate::engine::WeatherState;

const BASIC_CHANNEL_TYPES: &[&str] = &["WEATHER_SENSOR_CHANNEL", "WEATHER_SENSOR_PLUS_CHANNEL"];
const PRO_CHANNEL_TYPES: &[&str] = &["WEATHER_SENSOR_PRO_CHANNEL"];

/// Vendor weather condition to host condition.
const HOME_CONDITIONS: &[(&str, &str)] = &[
    ("CLEAR", "sunny"),
    ("LIGHT_CLOUDY", "partlycloudy"),
    ("CLOUDY", "cloudy"),
    ("CLOUDY_WITH_RAIN", "rainy"),
    ("CLOUDY_WITH_SNOW_RAIN", "snowy-rainy"),
    ("HEAVILY_CLOUDY", "cloudy"),
    ("HEAVILY_CLOUDY_WITH_RAIN", "rainy"),
    ("HEAVILY_CLOUDY_WITH_STRONG_RAIN", "snowy-rainy"),
    ("HEAVILY_CLOUDY_WITH_SNOW", "snowy"),
    ("HEAVILY_CLOUDY_WITH_SNOW_RAIN", "snowy-rainy"),
    ("HEAVILY_CLOUDY_WITH_THUNDER", "lightning"),
    ("HEAVILY_CLOUDY_WITH_RAIN_AND_THUNDER", "lightning-rainy"),
    ("FOGGY", "fog"),
    ("STRONG_WIND", "windy"),
];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    let mut entities: Vec<Box<dyn HmipEntity>> = Vec::new();

    for (device, channel) in channels_of_type(model, BASIC_CHANNEL_TYPES) {
        entities.push(Box::new(WeatherSensor {
            base: GenericEntity::for_channel("WeatherSensor", device, channel),
            pro: false,
        }));
    }
    for (device, channel) in channels_of_type(model, PRO_CHANNEL_TYPES) {
        entities.push(Box::new(WeatherSensor {
            base: GenericEntity::for_channel("WeatherSensorPro", device, channel),
            pro: true,
        }));
    }

    entities.push(Box::new(HomeWeather {
        base: GenericEntity::for_home("HomeWeather"),
    }));
    entities
}

/// Local weather station.
pub struct WeatherSensor {
    base: GenericEntity,
    /// Pro stations also report wind direction
    pro: bool,
}

impl HmipEntity for WeatherSensor {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Weather
    }

    /// Stations are named after the device alone.
    fn name(&self, ctx: &EntityContext<'_>) -> String {
        self.base
            .device(ctx.model)
            .map(|d| d.label.clone())
            .unwrap_or_default()
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let Some(channel) = self.base.channel(ctx.model) else {
            return EntityValue::Weather(WeatherState::default());
        };
        let set = |key| channel.bool(key).unwrap_or(false);

        let condition = if set("raining") {
            Some("rainy")
        } else if set("storm") {
            Some("windy")
        } else if set("sunshine") {
            Some("sunny")
        } else {
            None
        };

        EntityValue::Weather(WeatherState {
            condition: condition.map(str::to_string),
            temperature: channel.f64("actualTemperature"),
            humidity: channel.f64("humidity"),
            wind_speed: channel.f64("windSpeed"),
            wind_bearing: self.pro.then(|| channel.f64("windDirection")).flatten(),
        })
    }
}

/// Forecast service weather for the home location.
pub struct HomeWeather {
    base: GenericEntity,
}

impl HmipEntity for HomeWeather {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Weather
    }

    fn name(&self, ctx: &EntityContext<'_>) -> String {
        match ctx.model.home.location.as_ref().and_then(|l| l.city.as_deref()) {
            Some(city) => format!("Weather {city}"),
            None => "Weather".to_string(),
        }
    }

    fn available(&self, ctx: &EntityContext<'_>) -> bool {
        ctx.connected
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let Some(weather) = &ctx.model.home.weather else {
            return EntityValue::Weather(WeatherState::default());
        };
        let condition = weather.weather_condition.as_deref().and_then(|c| {
            HOME_CONDITIONS
                .iter()
                .find(|(vendor, _)| *vendor == c)
                .map(|(_, host)| host.to_string())
        });

        EntityValue::Weather(WeatherState {
            condition,
            temperature: weather.temperature,
            humidity: weather.humidity,
            wind_speed: weather.wind_speed.map(|s| (s * 10.0).round() / 10.0),
            wind_bearing: weather.wind_direction,
        })
    }

    fn attributes(&self, _ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("model_type".to_string(), "HmIP-Home-Weather".into());
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::homematicip::fixtures;
    use crate::integrations::homematicip::fixtures::WEATHER_ID;

    #[test]
    fn test_weather_entities() {
        let model = fixtures::model();
        let ctx = EntityContext {
            model: &model,
            connected: true,
            home_name: Some("Cabin"),
        };
        let entities = entities(&model);
        assert_eq!(entities.len(), 2);

        let station = &entities[0];
        assert_eq!(station.name(&ctx), "Garden Weather");
        assert_eq!(
            station.unique_id(),
            format!("WeatherSensorPro_Channel1_{WEATHER_ID}")
        );
        assert_eq!(
            station.value(&ctx),
            EntityValue::Weather(WeatherState {
                condition: Some("sunny".to_string()),
                temperature: Some(15.4),
                humidity: Some(65.0),
                wind_speed: Some(2.6),
                wind_bearing: Some(295.0),
            })
        );

        let home = &entities[1];
        assert_eq!(home.name(&ctx), "Weather 1010  Wien, Österreich");
        assert_eq!(
            home.value(&ctx),
            EntityValue::Weather(WeatherState {
                condition: Some("partlycloudy".to_string()),
                temperature: Some(16.3),
                humidity: Some(54.0),
                wind_speed: Some(8.6),
                wind_bearing: Some(294.0),
            })
        );
        assert_eq!(home.attributes(&ctx)["model_type"], "HmIP-Home-Weather");
    }

    #[test]
    fn test_home_weather_availability_and_unknown_condition() {
        let mut model = fixtures::model();
        if let Some(weather) = model.home.weather.as_mut() {
            weather.weather_condition = Some("UNKNOWN".to_string());
        }
        let ctx = EntityContext {
            model: &model,
            connected: false,
            home_name: None,
        };
        let home = entities(&model).pop().unwrap();
        assert!(!home.available(&ctx));
        let EntityValue::Weather(state) = home.value(&ctx) else {
            panic!("not a weather entity");
        };
        assert_eq!(state.condition, None);
    }

    #[test]
    fn test_station_condition_priority() {
        let mut model = fixtures::model();
        let channel = model
            .devices
            .get_mut(WEATHER_ID)
            .unwrap()
            .functional_channels
            .get_mut(&1)
            .unwrap();
        channel.attributes.insert("raining".to_string(), true.into());
        channel.attributes.insert("storm".to_string(), true.into());

        let ctx = EntityContext {
            model: &model,
            connected: true,
            home_name: None,
        };
        let EntityValue::Weather(state) = entities(&model)[0].value(&ctx) else {
            panic!("not a weather entity");
        };
        assert_eq!(state.condition.as_deref(), Some("rainy"));
    }
}

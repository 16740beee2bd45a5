//! Maps the vendor model onto host entities and assigns entity ids.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::binary_sensor;
use super::button;
use super::entity::EntityContext;
use super::entity::HmipEntity;
use super::entity::slugify;
use super::light;
use super::lock;
use super::model::ItemId;
use super::model::Model;
use super::sensor;
use super::switch;
use super::weather;

type PlatformSetup = fn(&Model) -> Vec<Box<dyn HmipEntity>>;

const PLATFORMS: &[PlatformSetup] = &[
    binary_sensor::entities,
    button::entities,
    light::entities,
    lock::entities,
    sensor::entities,
    switch::entities,
    weather::entities,
];

/// Every entity the model currently yields, in platform order.
pub fn build_entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    PLATFORMS.iter().flat_map(|setup| setup(model)).collect()
}

/// Entities keyed by host entity id.
#[derive(Clone, Default)]
pub struct EntitySet {
    entities: BTreeMap<String, Arc<dyn HmipEntity>>,
}

impl EntitySet {
    /// Build the entity set for the model. Entities already present in
    /// `previous` keep their entity ids; new ones get a fresh slug, suffixed
    /// on collision.
    pub fn build(ctx: &EntityContext<'_>, previous: Option<&EntitySet>) -> Self {
        let known: HashMap<String, String> = previous
            .map(|p| {
                p.entities
                    .iter()
                    .map(|(entity_id, e)| (e.unique_id(), entity_id.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut entities = BTreeMap::new();
        let mut fresh = Vec::new();

        for entity in build_entities(ctx.model) {
            let entity: Arc<dyn HmipEntity> = Arc::from(entity);
            match known.get(&entity.unique_id()) {
                Some(entity_id) if !entities.contains_key(entity_id) => {
                    entities.insert(entity_id.clone(), entity);
                }
                _ => fresh.push(entity),
            }
        }

        for entity in fresh {
            let base = format!("{}.{}", entity.platform(), slugify(&entity.name(ctx)));
            let mut entity_id = base.clone();
            let mut n = 2;
            while entities.contains_key(&entity_id) {
                entity_id = format!("{base}_{n}");
                n += 1;
            }
            entities.insert(entity_id, entity);
        }

        Self { entities }
    }

    pub fn get(&self, entity_id: &str) -> Option<&Arc<dyn HmipEntity>> {
        self.entities.get(entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn HmipEntity>)> {
        self.entities.iter()
    }

    /// Entities that render data from the given item.
    pub fn for_item<'a>(
        &'a self,
        id: &'a ItemId,
    ) -> impl Iterator<Item = (&'a String, &'a Arc<dyn HmipEntity>)> + 'a {
        self.entities
            .iter()
            .filter(move |(_, e)| e.base().source.item_id() == *id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::homematicip::fixtures;
    use crate::integrations::homematicip::fixtures::IO_BOX_ID;

    fn ctx(model: &Model) -> EntityContext<'_> {
        EntityContext {
            model,
            connected: true,
            home_name: None,
        }
    }

    #[test]
    fn test_entity_ids() {
        let model = fixtures::model();
        let set = EntitySet::build(&ctx(&model), None);
        assert_eq!(set.len(), 31);

        let ids: Vec<&str> = set.iter().map(|(id, _)| id.as_str()).collect();
        insta::assert_snapshot!(ids.join("\n"), @r"
        binary_sensor.alarm_sensors
        binary_sensor.cloud_connection
        binary_sensor.garden_weather_raining
        binary_sensor.garden_weather_storm
        binary_sensor.garden_weather_sunshine
        binary_sensor.internal_securityzone
        binary_sensor.window_bath
        binary_sensor.window_bath_battery
        button.garage
        light.bathroom_light_channel3
        light.bathroom_top
        light.hall_dimmer
        lock.front_door
        sensor.bedroom_radiator_heating
        sensor.bedroom_radiator_temperature
        sensor.energy_meter_currentpowerconsumption
        sensor.energy_meter_energy_counter_input_single_tariff
        sensor.energy_meter_energy_counter_usage_high_tariff
        sensor.energy_meter_power
        sensor.garden_weather_humidity
        sensor.garden_weather_temperature
        sensor.garden_weather_wind_direction
        sensor.garden_weather_windspeed
        sensor.kitchen_plug_energy_counter
        switch.io_box_channel2
        switch.kitchen_plug
        switch.living_group
        switch.pump
        weather.garden_weather
        weather.weather_1010_wien_osterreich
        ");
    }

    #[test]
    fn test_entity_ids_stable_across_rebuild() {
        let mut model = fixtures::model();
        let first = EntitySet::build(&ctx(&model), None);

        // Renaming the channel does not move the entity
        model
            .devices
            .get_mut(IO_BOX_ID)
            .unwrap()
            .functional_channels
            .get_mut(&1)
            .unwrap()
            .label = Some("Fountain".to_string());
        let second = EntitySet::build(&ctx(&model), Some(&first));
        let pump = second.get("switch.pump").unwrap();
        assert_eq!(pump.name(&ctx(&model)), "Fountain");
        assert!(!second.contains("switch.fountain"));

        // A removed device drops its entities
        model.devices.remove(IO_BOX_ID);
        let third = EntitySet::build(&ctx(&model), Some(&second));
        assert_eq!(third.len(), 29);
        assert!(!third.contains("switch.pump"));
    }

    #[test]
    fn test_colliding_names_get_suffix() {
        let mut model = fixtures::model();
        let mut twin = model.devices[fixtures::DIMMER_ID].clone();
        twin.id = "3014F711A0000000000000B1".to_string();
        model.devices.insert(twin.id.clone(), twin);

        let set = EntitySet::build(&ctx(&model), None);
        assert!(set.contains("light.hall_dimmer"));
        assert!(set.contains("light.hall_dimmer_2"));
    }

    #[test]
    fn test_for_item() {
        let model = fixtures::model();
        let set = EntitySet::build(&ctx(&model), None);

        let io_box_id = ItemId::Device(IO_BOX_ID.to_string());
        let io_box: Vec<&str> = set
            .for_item(&io_box_id)
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(io_box, vec!["switch.io_box_channel2", "switch.pump"]);

        let home: Vec<&str> = set
            .for_item(&ItemId::Home)
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(
            home,
            vec![
                "binary_sensor.cloud_connection",
                "weather.weather_1010_wien_osterreich"
            ]
        );
    }
}

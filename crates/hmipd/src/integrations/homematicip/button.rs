use super::client::Action;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::Model;
use crate::engine::EntityCommand;
use crate::engine::EntityValue;
use crate::engine::Platform;

const CHANNEL_TYPES: &[&str] = &["IMPULSE_OUTPUT_CHANNEL"];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    channels_of_type(model, CHANNEL_TYPES)
        .map(|(device, channel)| {
            Box::new(GarageDoorControllerButton {
                base: GenericEntity::for_channel("GarageDoorControllerButton", device, channel),
            }) as Box<dyn HmipEntity>
        })
        .collect()
}

/// Impulse output, e.g. of a garage door controller.
pub struct GarageDoorControllerButton {
    base: GenericEntity,
}

impl HmipEntity for GarageDoorControllerButton {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Button
    }

    fn value(&self, _ctx: &EntityContext<'_>) -> EntityValue {
        EntityValue::Button
    }

    fn action(&self, _model: &Model, command: &EntityCommand) -> Option<Action> {
        match command {
            EntityCommand::Press => Some(Action::StartImpulse {
                device_id: self.base.device_id()?.to_string(),
                channel_index: self.base.channel_index()?,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::homematicip::fixtures;
    use crate::integrations::homematicip::fixtures::GARAGE_ID;

    #[test]
    fn test_garage_button() {
        let model = fixtures::model();
        let ctx = EntityContext {
            model: &model,
            connected: true,
            home_name: None,
        };
        let entities = entities(&model);
        assert_eq!(entities.len(), 1);

        let button = &entities[0];
        assert_eq!(button.name(&ctx), "Garage");
        assert_eq!(button.value(&ctx), EntityValue::Button);
        assert_eq!(
            button.action(&model, &EntityCommand::Press),
            Some(Action::StartImpulse {
                device_id: GARAGE_ID.to_string(),
                channel_index: 1,
            })
        );
        assert_eq!(button.action(&model, &EntityCommand::turn_on()), None);
    }
}
